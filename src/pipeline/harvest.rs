// src/pipeline/harvest.rs

//! Input file to report file.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, DomainEntry, NormalizedDomain, RenderConfig};
use crate::pipeline::dedup::dedupe;
use crate::pipeline::schedule::{BatchScheduler, RunSummary, SiteReport};
use crate::services::{
    DnsMxResolver, MxValidator, PageSource, RetryPolicy, SiteCrawler, StaticFetcher, TcpProber,
};
use crate::storage::{CsvReport, read_input};

/// Wire the production services together.
pub fn build_scheduler(config: &Config) -> Result<BatchScheduler> {
    let resolver = Arc::new(DnsMxResolver::from_config(&config.dns));
    let mx = Arc::new(MxValidator::new(resolver, RetryPolicy::from(&config.dns)));
    let probe = Arc::new(TcpProber::new(&config.probe).with_mx(Arc::clone(&mx)));

    let static_source = Arc::new(StaticFetcher::new(&config.crawler)?);
    let crawler = SiteCrawler::new(config, static_source, rendered_source(&config.render))?;

    Ok(BatchScheduler::new(
        probe,
        Arc::new(crawler),
        mx,
        config.scheduler.concurrency,
    ))
}

#[cfg(feature = "render")]
fn rendered_source(config: &RenderConfig) -> Option<Arc<dyn PageSource>> {
    if !config.enabled {
        log::info!("Rendered crawls disabled");
        return None;
    }
    Some(Arc::new(crate::services::RenderedFetcher::new(config)))
}

#[cfg(not(feature = "render"))]
fn rendered_source(config: &RenderConfig) -> Option<Arc<dyn PageSource>> {
    if config.enabled {
        log::warn!("Built without the `render` feature; JavaScript-only sites get static results");
    }
    None
}

/// Run the whole pipeline: read, deduplicate, crawl in batches, write.
pub async fn run_harvest(config: &Config) -> Result<RunSummary> {
    let started = Utc::now();

    let rows = read_input(&config.paths.input_file).map_err(|e| {
        AppError::config(format!(
            "cannot read input {}: {e}",
            config.paths.input_file.display()
        ))
    })?;
    let entries = dedupe(&rows);
    log::info!(
        "Loaded {} rows ({} unique domains) from {}",
        rows.len(),
        entries.len(),
        config.paths.input_file.display()
    );

    let scheduler = build_scheduler(config)?;
    let mut report = CsvReport::create(&config.paths.output_file)?;
    let summary = scheduler.run(&entries, &mut report).await?;

    let finished = Utc::now();
    log::info!(
        "Harvest finished in {}s: {} sites, {} reachable, {} mail-capable, {} escalated, {} aborted",
        (finished - started).num_seconds(),
        summary.sites,
        summary.reachable,
        summary.mail_capable_sites,
        summary.escalated,
        summary.aborted
    );
    log::info!(
        "Addresses: {} host, {} third-party, {} dropped without MX ({} mail-domains checked)",
        summary.host_addresses,
        summary.third_party_addresses,
        summary.dropped_addresses,
        summary.mail_domains_checked
    );
    log::info!("Report saved to {}", config.paths.output_file.display());

    Ok(summary)
}

/// Probe, crawl and classify a single site.
pub async fn inspect_site(config: &Config, raw_url: &str) -> Result<SiteReport> {
    let domain = NormalizedDomain::from_url(raw_url);
    if domain.is_empty() {
        return Err(AppError::validation(format!("'{raw_url}' is not a valid URL")));
    }

    let scheduler = build_scheduler(config)?;
    let entry = DomainEntry {
        name: domain.to_string(),
        domain,
    };
    Ok(scheduler.process(&entry).await)
}
