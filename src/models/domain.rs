//! Normalized site domains.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Lowercase hostname without leading `www.` labels.
///
/// Empty when the source URL could not be parsed. Used as the deduplication
/// key across the whole run and as the reference for address classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDomain(String);

impl NormalizedDomain {
    /// Normalize the host of a raw URL. Unparsable URLs yield the empty domain.
    pub fn from_url(raw: &str) -> Self {
        Url::parse(raw.trim())
            .ok()
            .and_then(|url| url.host_str().map(Self::from_host))
            .unwrap_or_default()
    }

    /// Normalize a bare hostname.
    ///
    /// Every leading `www.` label is stripped, which keeps normalization
    /// idempotent for hosts like `www.www.example.com`.
    pub fn from_host(host: &str) -> Self {
        let mut host = host.trim().to_lowercase();
        while let Some(rest) = host.strip_prefix("www.") {
            host = rest.to_string();
        }
        Self(host)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `host` is this domain or one of its subdomains.
    pub fn covers(&self, host: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let host = Self::from_host(host);
        host.0 == self.0
            || host
                .0
                .strip_suffix(&self.0)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Seed URL for crawling this domain.
    pub fn start_url(&self) -> Option<Url> {
        if self.is_empty() {
            return None;
        }
        Url::parse(&format!("https://{}", self.0)).ok()
    }
}

impl fmt::Display for NormalizedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(
            NormalizedDomain::from_url("https://www.Example.COM/contact").as_str(),
            "example.com"
        );
        assert_eq!(
            NormalizedDomain::from_url("http://shop.example.com:8080/x").as_str(),
            "shop.example.com"
        );
        assert_eq!(
            NormalizedDomain::from_url("  https://acme.test  ").as_str(),
            "acme.test"
        );
    }

    #[test]
    fn test_unparsable_url_is_empty() {
        assert!(NormalizedDomain::from_url("acme.test").is_empty());
        assert!(NormalizedDomain::from_url("").is_empty());
        assert!(NormalizedDomain::from_url("not a url").is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in [
            "https://www.example.com",
            "https://WWW.www.Example.org/path",
            "https://sub.domain.example.net",
            "https://www2.example.com",
            "garbage",
        ] {
            let once = NormalizedDomain::from_url(raw);
            let twice = NormalizedDomain::from_host(once.as_str());
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_covers_domain_and_subdomains() {
        let site = NormalizedDomain::from_host("example.com");
        assert!(site.covers("example.com"));
        assert!(site.covers("www.example.com"));
        assert!(site.covers("mail.example.com"));
        assert!(!site.covers("badexample.com"));
        assert!(!site.covers("example.com.evil.org"));
        assert!(!site.covers("partner.org"));
    }

    #[test]
    fn test_empty_domain_covers_nothing() {
        let site = NormalizedDomain::default();
        assert!(!site.covers(""));
        assert!(!site.covers("example.com"));
        assert!(site.start_url().is_none());
    }

    #[test]
    fn test_start_url() {
        let site = NormalizedDomain::from_host("acme.test");
        assert_eq!(site.start_url().unwrap().as_str(), "https://acme.test/");
    }
}
