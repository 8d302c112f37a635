//! Same-domain link discovery and path filtering.

use std::collections::HashSet;
use std::sync::LazyLock;

use glob::{MatchOptions, Pattern};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FilterConfig, NormalizedDomain};

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled path glob. A trailing `/` only matches directory-style paths.
#[derive(Debug, Clone)]
struct PathGlob {
    pattern: Pattern,
    directory_only: bool,
}

impl PathGlob {
    fn new(raw: &str) -> Result<Self> {
        let directory_only = raw.ends_with('/');
        let body = if directory_only {
            raw.trim_end_matches('/')
        } else {
            raw
        };
        let pattern = Pattern::new(if body.is_empty() { "**" } else { body })
            .map_err(|e| AppError::config(format!("invalid path glob '{raw}': {e}")))?;
        Ok(Self {
            pattern,
            directory_only,
        })
    }

    fn matches(&self, path: &str) -> bool {
        if self.directory_only {
            path.ends_with('/')
                && self
                    .pattern
                    .matches_with(path.trim_end_matches('/'), MATCH_OPTIONS)
        } else {
            self.pattern.matches_with(path, MATCH_OPTIONS)
        }
    }
}

/// Include/exclude globs applied to the path of discovered links.
///
/// Paths are matched without their leading `/`. The site root is always
/// allowed; an empty include list allows every path not excluded.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Vec<PathGlob>,
    exclude: Vec<PathGlob>,
}

impl PathFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            include: Self::compile(&config.include)?,
            exclude: Self::compile(&config.exclude)?,
        })
    }

    fn compile(patterns: &[String]) -> Result<Vec<PathGlob>> {
        patterns.iter().map(|p| PathGlob::new(p)).collect()
    }

    /// Whether a link with this URL should be crawled.
    pub fn allows(&self, url: &Url) -> bool {
        let path = url.path().trim_start_matches('/');
        if path.is_empty() {
            return true;
        }
        if self.exclude.iter().any(|glob| glob.matches(path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|glob| glob.matches(path))
    }
}

/// Yield in-scope absolute URLs linked from a page, in document order.
///
/// A link is in scope when it uses http(s), its host is one of the `scope`
/// domains or a subdomain of one, and its path passes the filter. Fragments
/// are dropped.
pub fn discover_links(
    document: &Html,
    base: &Url,
    scope: &[NormalizedDomain],
    filter: &PathFilter,
) -> Vec<Url> {
    let mut seen = HashSet::new();
    document
        .select(&LINK_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .filter(|url| {
            url.host_str()
                .is_some_and(|host| scope.iter().any(|domain| domain.covers(host)))
        })
        .filter(|url| filter.allows(url))
        .filter(|url| seen.insert(url.to_string()))
        .collect()
}

/// Resolve an `href` against the page URL, keeping only web links.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
