// src/pipeline/schedule.rs

//! Batch scheduling of site tasks.
//!
//! Domains are processed in fixed-size batches. Every task of a batch runs
//! concurrently and the next batch starts once the whole batch is done, at
//! which point its rows are written in input order and flushed.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{ClassifiedResult, CrawlOutcome, CrawlTask, DomainEntry, NormalizedDomain};
use crate::services::extractor::mail_domain;
use crate::services::{MxValidator, ProbeResult, ReachabilityProbe, SiteCrawler};
use crate::storage::ReportSink;

/// Whether an address belongs to the crawled site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Host,
    ThirdParty,
}

impl AddressClass {
    /// Classify by mail-domain: the site domain or any of its subdomains is
    /// the host, anything else a third party.
    pub fn of(mail_domain: &str, site: &NormalizedDomain) -> Self {
        if site.covers(mail_domain) {
            AddressClass::Host
        } else {
            AddressClass::ThirdParty
        }
    }
}

/// Everything known about one processed site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    #[serde(flatten)]
    pub result: ClassifiedResult,
    pub probe: ProbeResult,
    pub crawl: Option<CrawlOutcome>,
    /// Addresses dropped because their mail-domain has no MX record
    pub dropped_addresses: Vec<String>,
}

impl SiteReport {
    fn not_crawled(entry: &DomainEntry, probe: ProbeResult) -> Self {
        Self {
            result: ClassifiedResult::unreachable(entry),
            probe,
            crawl: None,
            dropped_addresses: Vec::new(),
        }
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sites: usize,
    pub reachable: usize,
    pub mail_capable_sites: usize,
    pub escalated: usize,
    pub aborted: usize,
    pub host_addresses: usize,
    pub third_party_addresses: usize,
    pub dropped_addresses: usize,
    /// Distinct mail-domains resolved during the run
    pub mail_domains_checked: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &SiteReport) {
        self.sites += 1;
        if report.result.https_reachable {
            self.reachable += 1;
        }
        if report.probe.mail_capable {
            self.mail_capable_sites += 1;
        }
        if let Some(crawl) = &report.crawl {
            if crawl.escalated {
                self.escalated += 1;
            }
            if crawl.aborted() {
                self.aborted += 1;
            }
        }
        self.host_addresses += report.result.host_emails.len();
        self.third_party_addresses += report.result.third_party_emails.len();
        self.dropped_addresses += report.dropped_addresses.len();
    }
}

/// Runs probe, crawl and classification for batches of domains.
pub struct BatchScheduler {
    probe: Arc<dyn ReachabilityProbe>,
    crawler: Arc<SiteCrawler>,
    mx: Arc<MxValidator>,
    concurrency: usize,
}

impl BatchScheduler {
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        crawler: Arc<SiteCrawler>,
        mx: Arc<MxValidator>,
        concurrency: usize,
    ) -> Self {
        Self {
            probe,
            crawler,
            mx,
            concurrency: concurrency.max(1),
        }
    }

    /// Process every entry and write one report row per entry.
    ///
    /// Only report write failures end the run early.
    pub async fn run(&self, entries: &[DomainEntry], sink: &mut dyn ReportSink) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let batches = entries.len().div_ceil(self.concurrency);

        for (index, batch) in entries.chunks(self.concurrency).enumerate() {
            let reports = join_all(batch.iter().map(|entry| self.process(entry))).await;
            for report in &reports {
                sink.write_result(&report.result)?;
                summary.record(report);
            }
            sink.flush()?;

            log::info!(
                "Batch {}/{} written ({} of {} sites)",
                index + 1,
                batches,
                summary.sites,
                entries.len()
            );
        }

        summary.mail_domains_checked = self.mx.cached_count().await;
        Ok(summary)
    }

    /// Probe, crawl and classify a single site. Never fails.
    pub async fn process(&self, entry: &DomainEntry) -> SiteReport {
        if entry.domain.is_empty() {
            log::warn!("{}: invalid URL, not crawled", entry.name);
            return SiteReport::not_crawled(entry, ProbeResult::default());
        }

        let probe = self.probe.probe(&entry.domain).await;
        if !probe.secure_reachable {
            log::info!("{}", AppError::Unreachable(entry.domain.to_string()));
            return SiteReport::not_crawled(entry, probe);
        }
        log::info!(
            "Domain {} reachable (mail capable: {})",
            entry.domain,
            probe.mail_capable
        );

        let Some(task) = CrawlTask::for_domain(&entry.domain) else {
            log::warn!("{}: no valid start URL", entry.domain);
            return SiteReport::not_crawled(entry, probe);
        };

        let outcome = self.crawler.crawl(&task).await;
        let mut report = self.classify(entry, &outcome).await;
        report.probe = probe;
        report.crawl = Some(outcome);
        report
    }

    async fn classify(&self, entry: &DomainEntry, outcome: &CrawlOutcome) -> SiteReport {
        let checks = outcome.addresses.iter().map(|address| async move {
            let capable = match mail_domain(address) {
                Some(domain) => self.mx.is_mail_capable(domain).await,
                None => false,
            };
            (address, capable)
        });

        let mut result = ClassifiedResult {
            name: entry.name.clone(),
            domain: entry.domain.clone(),
            https_reachable: true,
            ..ClassifiedResult::default()
        };
        let mut dropped_addresses = Vec::new();

        for (address, capable) in join_all(checks).await {
            let Some(domain) = mail_domain(address).filter(|_| capable) else {
                log::debug!("Dropping {address}: no mail exchanger");
                dropped_addresses.push(address.clone());
                continue;
            };
            match AddressClass::of(domain, &entry.domain) {
                AddressClass::Host => result.host_emails.push(address.clone()),
                AddressClass::ThirdParty => result.third_party_emails.push(address.clone()),
            }
        }

        log::info!(
            "{}: {} host, {} third-party, {} dropped",
            entry.domain,
            result.host_emails.len(),
            result.third_party_emails.len(),
            dropped_addresses.len()
        );

        SiteReport {
            result,
            probe: ProbeResult::default(),
            crawl: None,
            dropped_addresses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use url::Url;

    use crate::error::DnsFailure;
    use crate::models::{Config, Page};
    use crate::services::{MxResolver, PageSource, RetryPolicy};
    use crate::storage::CsvReport;

    /// Reachability by domain, with an optional delay to shuffle completion order.
    struct FakeProbe {
        reachable: HashMap<String, u64>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        fn new(reachable: &[(&str, u64)]) -> Arc<Self> {
            Arc::new(Self {
                reachable: reachable
                    .iter()
                    .map(|(d, delay)| (d.to_string(), *delay))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReachabilityProbe for FakeProbe {
        async fn probe(&self, domain: &NormalizedDomain) -> ProbeResult {
            self.calls.lock().unwrap().push(domain.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.reachable.get(domain.as_str()).copied();
            tokio::time::sleep(Duration::from_millis(delay.unwrap_or(5))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            ProbeResult {
                secure_reachable: delay.is_some(),
                mail_capable: delay.is_some(),
            }
        }
    }

    /// Serves one page per host.
    struct FakeSite {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageSource for FakeSite {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn request_timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn fetch(&self, url: &Url) -> Result<Page> {
            let host = url.host_str().unwrap_or_default();
            match self.pages.get(host) {
                Some(body) if url.path() == "/" => Ok(Page::new(url.clone(), body.clone())),
                _ => Err(AppError::request(url.as_str(), "HTTP 404 Not Found")),
            }
        }
    }

    struct FakeMx {
        capable: HashSet<String>,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl MxResolver for FakeMx {
        async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.capable.contains(domain) {
                Ok(vec![format!("mx.{domain}")])
            } else {
                Err(AppError::dns(domain, DnsFailure::NotFound, "no records found"))
            }
        }
    }

    fn entry(name: &str, domain: &str) -> DomainEntry {
        DomainEntry {
            name: name.to_string(),
            domain: NormalizedDomain::from_host(domain),
        }
    }

    fn scheduler(
        probe: Arc<FakeProbe>,
        pages: &[(&str, &str)],
        capable: &[&str],
        concurrency: usize,
    ) -> (BatchScheduler, Arc<FakeMx>) {
        let site = Arc::new(FakeSite {
            pages: pages
                .iter()
                .map(|(host, body)| (host.to_string(), body.to_string()))
                .collect(),
        });
        let crawler = SiteCrawler::new(&Config::default(), site, None).unwrap();
        let resolver = Arc::new(FakeMx {
            capable: capable.iter().map(|d| d.to_string()).collect(),
            queries: AtomicUsize::new(0),
        });
        let mx = Arc::new(MxValidator::new(resolver.clone(), RetryPolicy::none()));
        (
            BatchScheduler::new(probe, Arc::new(crawler), mx, concurrency),
            resolver,
        )
    }

    async fn report_rows(scheduler: &BatchScheduler, entries: &[DomainEntry]) -> Vec<String> {
        let mut report = CsvReport::from_writer(Vec::new()).unwrap();
        scheduler.run(entries, &mut report).await.unwrap();
        let bytes = report.into_inner().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .skip(1)
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_address_classification() {
        let site = NormalizedDomain::from_host("example.com");
        assert_eq!(AddressClass::of("example.com", &site), AddressClass::Host);
        assert_eq!(AddressClass::of("www.example.com", &site), AddressClass::Host);
        assert_eq!(AddressClass::of("mail.example.com", &site), AddressClass::Host);
        assert_eq!(AddressClass::of("gmail.com", &site), AddressClass::ThirdParty);
        assert_eq!(
            AddressClass::of("notexample.com", &site),
            AddressClass::ThirdParty
        );
        assert_eq!(
            AddressClass::of("example.com", &NormalizedDomain::default()),
            AddressClass::ThirdParty
        );
    }

    #[tokio::test]
    async fn test_unreachable_site_row() {
        let probe = FakeProbe::new(&[]);
        let (scheduler, _) = scheduler(probe, &[], &[], 5);
        let rows = report_rows(&scheduler, &[entry("Acme", "acme.test")]).await;
        assert_eq!(rows, vec!["Acme;acme.test;false;;"]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_probed() {
        let probe = FakeProbe::new(&[]);
        let (scheduler, _) = scheduler(probe.clone(), &[], &[], 5);
        let report = scheduler
            .process(&DomainEntry {
                name: "Broken".into(),
                domain: NormalizedDomain::default(),
            })
            .await;
        assert!(!report.result.https_reachable);
        assert!(probe.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classifies_and_drops_addresses_without_mx() {
        let probe = FakeProbe::new(&[("acme.test", 1)]);
        let body = "info@acme.test sales@shop.acme.test agency@partner.example ghost@nomx.example";
        let (scheduler, _) = scheduler(
            probe,
            &[("acme.test", body)],
            &["acme.test", "shop.acme.test", "partner.example"],
            5,
        );

        let report = scheduler.process(&entry("Acme", "acme.test")).await;

        assert!(report.result.https_reachable);
        assert_eq!(
            report.result.host_emails,
            vec!["info@acme.test", "sales@shop.acme.test"]
        );
        assert_eq!(report.result.third_party_emails, vec!["agency@partner.example"]);
        assert_eq!(report.dropped_addresses, vec!["ghost@nomx.example"]);
    }

    #[tokio::test]
    async fn test_address_reported_once_lowercased() {
        let probe = FakeProbe::new(&[("example.com", 1)]);
        let body = r#"Contact@Example.COM <a href="mailto:contact@example.com">x</a> CONTACT@example.com"#;
        let (scheduler, resolver) =
            scheduler(probe, &[("example.com", body)], &["example.com"], 5);

        let rows = report_rows(&scheduler, &[entry("Example", "example.com")]).await;

        assert_eq!(rows, vec!["Example;example.com;true;contact@example.com;"]);
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.mx.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_rows_follow_input_order_within_batch() {
        let probe = FakeProbe::new(&[("slow.test", 60), ("mid.test", 30), ("fast.test", 1)]);
        let (scheduler, _) = scheduler(probe, &[], &[], 3);

        let rows = report_rows(
            &scheduler,
            &[
                entry("Slow", "slow.test"),
                entry("Mid", "mid.test"),
                entry("Fast", "fast.test"),
            ],
        )
        .await;

        assert_eq!(
            rows,
            vec![
                "Slow;slow.test;true;;",
                "Mid;mid.test;true;;",
                "Fast;fast.test;true;;",
            ]
        );
    }

    #[tokio::test]
    async fn test_batches_bound_concurrency() {
        let probe = FakeProbe::new(&[]);
        let (scheduler, _) = scheduler(probe.clone(), &[], &[], 2);
        let entries: Vec<_> = (0..5)
            .map(|i| entry(&format!("Site {i}"), &format!("site{i}.test")))
            .collect();

        let mut report = CsvReport::from_writer(Vec::new()).unwrap();
        let summary = scheduler.run(&entries, &mut report).await.unwrap();

        assert_eq!(summary.sites, 5);
        assert_eq!(summary.reachable, 0);
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 2);
    }
}
