//! Per-site crawl orchestration.
//!
//! A crawl starts with plain HTTP fetches. When a page turns out to need
//! JavaScript, the static phase stops and the site is crawled again from the
//! seed with the rendered page source. Addresses from both phases are merged.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    AddressSet, Config, CrawlOutcome, CrawlState, CrawlTask, NormalizedDomain, Page,
};
use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerResult};
use crate::services::extractor::{extract_from_anchors, extract_from_mail_link, extract_from_text};
use crate::services::links::{PathFilter, discover_links};
use crate::services::PageSource;

/// How a crawl phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseEnd {
    Completed,
    NeedsRendering,
    Aborted,
}

/// Counters shared by both phases of one crawl.
#[derive(Debug, Default)]
struct CrawlProgress {
    addresses: AddressSet,
    pages_fetched: usize,
    pages_failed: usize,
}

/// Everything one fetched page contributes to the crawl.
#[derive(Debug, Default)]
struct PageHarvest {
    addresses: AddressSet,
    links: Vec<Url>,
    needs_rendering: bool,
}

/// Crawls one site at a time; safe to share across concurrent tasks.
pub struct SiteCrawler {
    static_source: Arc<dyn PageSource>,
    rendered_source: Option<Arc<dyn PageSource>>,
    filter: PathFilter,
    max_requests: usize,
    page_concurrency: usize,
    max_blocked: usize,
    js_sentinel: String,
}

impl SiteCrawler {
    pub fn new(
        config: &Config,
        static_source: Arc<dyn PageSource>,
        rendered_source: Option<Arc<dyn PageSource>>,
    ) -> Result<Self> {
        Ok(Self {
            static_source,
            rendered_source,
            filter: PathFilter::new(&config.filters)?,
            max_requests: config.crawler.max_requests_per_crawl,
            page_concurrency: config.crawler.page_concurrency.max(1),
            max_blocked: config.crawler.max_blocked,
            js_sentinel: config.crawler.js_sentinel.clone(),
        })
    }

    /// Crawl a site. Never fails: fetch errors are counted and logged, and an
    /// aborted crawl still returns what it collected.
    pub async fn crawl(&self, task: &CrawlTask) -> CrawlOutcome {
        let mut breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            max_blocked: self.max_blocked,
        });
        let mut progress = CrawlProgress::default();

        log::debug!("{}: {} at {}", task.domain, CrawlState::Queued, task.start_url);
        log::debug!("{}: {}", task.domain, CrawlState::StaticCrawl);
        let static_end = self
            .run_phase(self.static_source.as_ref(), task, &mut breaker, &mut progress, true)
            .await;

        let escalated = static_end == PhaseEnd::NeedsRendering;
        let state = match static_end {
            PhaseEnd::Completed => CrawlState::Done,
            PhaseEnd::Aborted => CrawlState::Aborted,
            PhaseEnd::NeedsRendering => {
                log::info!("{}: {}", task.domain, CrawlState::EscalateToRendered);
                match &self.rendered_source {
                    Some(rendered) => {
                        log::debug!("{}: {}", task.domain, CrawlState::RenderedCrawl);
                        match self
                            .run_phase(rendered.as_ref(), task, &mut breaker, &mut progress, false)
                            .await
                        {
                            PhaseEnd::Aborted => CrawlState::Aborted,
                            _ => CrawlState::Done,
                        }
                    }
                    None => {
                        log::warn!(
                            "{} needs JavaScript rendering but rendering is disabled; keeping static results",
                            task.domain
                        );
                        CrawlState::Done
                    }
                }
            }
        };

        if state == CrawlState::Aborted {
            let error = AppError::CrawlAborted {
                domain: task.domain.to_string(),
                blocked: breaker.blocked(),
            };
            log::warn!("{error}");
        }

        log::debug!(
            "{}: {} ({} pages, {} failed, {} addresses)",
            task.domain,
            state,
            progress.pages_fetched,
            progress.pages_failed,
            progress.addresses.len()
        );

        CrawlOutcome {
            addresses: progress.addresses,
            escalated,
            state,
            pages_fetched: progress.pages_fetched,
            pages_failed: progress.pages_failed,
            blocked_requests: breaker.blocked(),
        }
    }

    async fn run_phase(
        &self,
        source: &dyn PageSource,
        task: &CrawlTask,
        breaker: &mut CircuitBreaker,
        progress: &mut CrawlProgress,
        detect_sentinel: bool,
    ) -> PhaseEnd {
        let mut frontier = VecDeque::from([task.start_url.clone()]);
        let mut seen = HashSet::from([task.start_url.to_string()]);
        let mut scope = vec![task.domain.clone()];
        let mut requests = 0;
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.page_concurrency && requests < self.max_requests {
                let Some(url) = frontier.pop_front() else {
                    break;
                };
                requests += 1;
                in_flight.push(fetch_page(source, url));
            }

            let Some((url, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(page) => {
                    progress.pages_fetched += 1;
                    if url == task.start_url {
                        widen_scope(&mut scope, &page.url);
                    }
                    let harvest = self.harvest(&page, &scope);
                    progress.addresses.extend(harvest.addresses);

                    if detect_sentinel && harvest.needs_rendering {
                        log::debug!("{url} requires JavaScript");
                        return PhaseEnd::NeedsRendering;
                    }

                    for link in harvest.links {
                        if seen.insert(link.to_string()) {
                            frontier.push_back(link);
                        }
                    }
                }
                Err(error) => {
                    progress.pages_failed += 1;
                    match breaker.record(&error) {
                        CircuitBreakerResult::Tripped { .. } => return PhaseEnd::Aborted,
                        CircuitBreakerResult::Counted { blocked } => {
                            log::warn!("{error} ({blocked}/{})", self.max_blocked)
                        }
                        CircuitBreakerResult::Ignored => {
                            log::debug!("[{}] {error}", source.name())
                        }
                    }
                }
            }
        }

        if requests >= self.max_requests && !frontier.is_empty() {
            log::debug!(
                "{}: request cap of {} reached with {} links left",
                task.domain,
                self.max_requests,
                frontier.len()
            );
        }
        PhaseEnd::Completed
    }

    /// Parse a page and collect its addresses and in-scope links.
    ///
    /// Kept synchronous: the parsed document must not live across an await.
    fn harvest(&self, page: &Page, scope: &[NormalizedDomain]) -> PageHarvest {
        let mut addresses = AddressSet::new();
        extract_from_text(&page.body, &mut addresses);
        for href in &page.mail_links {
            extract_from_mail_link(href, &mut addresses);
        }

        let document = Html::parse_document(&page.body);
        extract_from_anchors(&document, &mut addresses);
        let links = discover_links(&document, &page.url, scope, &self.filter);

        PageHarvest {
            addresses,
            links,
            needs_rendering: page.body.contains(&self.js_sentinel),
        }
    }
}

/// Add the host the seed request ended on when it lies outside the scope.
fn widen_scope(scope: &mut Vec<NormalizedDomain>, final_url: &Url) {
    let Some(host) = final_url.host_str() else {
        return;
    };
    if scope.iter().any(|domain| domain.covers(host)) {
        return;
    }
    let domain = NormalizedDomain::from_host(host);
    if !domain.is_empty() {
        log::debug!("Seed redirected to {domain}; following its links");
        scope.push(domain);
    }
}

/// Fetch one URL, bounded by the source's request timeout.
async fn fetch_page(source: &dyn PageSource, url: Url) -> (Url, Result<Page>) {
    let timeout = source.request_timeout();
    let result = match tokio::time::timeout(timeout, source.fetch(&url)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }),
    };
    (url, result)
}
