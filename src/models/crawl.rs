//! Per-site crawl data structures.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::models::NormalizedDomain;

/// Work unit for one unique domain.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub domain: NormalizedDomain,
    pub start_url: Url,
}

impl CrawlTask {
    /// Build a task seeded at `https://<domain>`. Returns `None` for the empty domain.
    pub fn for_domain(domain: &NormalizedDomain) -> Option<Self> {
        domain.start_url().map(|start_url| Self {
            domain: domain.clone(),
            start_url,
        })
    }
}

/// Lowercase, deduplicated addresses collected during one crawl.
///
/// Iteration is sorted so reports are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressSet(BTreeSet<String>);

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an address, lowercasing it. Returns true if it was new.
    pub fn insert(&mut self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }
        self.0.insert(address.to_lowercase())
    }

    pub fn extend(&mut self, other: AddressSet) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains(&address.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl IntoIterator for AddressSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Crawl lifecycle of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Queued,
    StaticCrawl,
    EscalateToRendered,
    RenderedCrawl,
    Done,
    Aborted,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Queued => "queued",
            CrawlState::StaticCrawl => "static crawl",
            CrawlState::EscalateToRendered => "escalating to rendered crawl",
            CrawlState::RenderedCrawl => "rendered crawl",
            CrawlState::Done => "done",
            CrawlState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Result of crawling one site.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub addresses: AddressSet,
    /// Whether the site required a rendered crawl (informational)
    pub escalated: bool,
    pub state: CrawlState,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub blocked_requests: usize,
}

impl CrawlOutcome {
    pub fn aborted(&self) -> bool {
        self.state == CrawlState::Aborted
    }
}

/// Page content obtained by a page source.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects, used to resolve relative links
    pub url: Url,
    /// Raw body or rendered DOM serialization
    pub body: String,
    /// `mailto:` targets read from the live DOM (rendered pages only)
    pub mail_links: Vec<String>,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
            mail_links: Vec::new(),
        }
    }
}
