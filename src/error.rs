// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Delimited file read/write failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input line could not be turned into a row
    #[error("Malformed input row {line}: {message}")]
    MalformedRow { line: usize, message: String },

    /// Secure port of the domain did not accept a connection
    #[error("Domain {0} is not reachable")]
    Unreachable(String),

    /// A single page fetch failed
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with an access-denied status
    #[error("Access denied (403) for {url}")]
    AccessDenied { url: String },

    /// A page fetch exceeded its time budget
    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Too many access-denied responses for one site
    #[error("Crawl of {domain} aborted after {blocked} blocked requests")]
    CrawlAborted { domain: String, blocked: usize },

    /// MX lookup failed
    #[error("DNS lookup for {domain} failed ({kind}): {message}")]
    Dns {
        domain: String,
        kind: DnsFailure,
        message: String,
    },

    /// Headless browser failure
    #[error("Render error: {0}")]
    Render(String),
}

/// Classification of a DNS resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsFailure {
    /// NXDOMAIN or an empty answer
    NotFound,
    /// No answer within the resolver timeout
    Timeout,
    /// Server failure, malformed response, transport error
    ServFail,
}

impl DnsFailure {
    /// Whether a retry could plausibly produce a different answer.
    pub fn is_transient(self) -> bool {
        !matches!(self, DnsFailure::NotFound)
    }
}

impl fmt::Display for DnsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsFailure::NotFound => write!(f, "not found"),
            DnsFailure::Timeout => write!(f, "timeout"),
            DnsFailure::ServFail => write!(f, "server failure"),
        }
    }
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a request failure for a URL.
    pub fn request(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Request {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a DNS failure.
    pub fn dns(domain: impl Into<String>, kind: DnsFailure, message: impl fmt::Display) -> Self {
        Self::Dns {
            domain: domain.into(),
            kind,
            message: message.to_string(),
        }
    }

    /// Create a headless browser error.
    pub fn render(message: impl fmt::Display) -> Self {
        Self::Render(message.to_string())
    }

    /// Whether this error counts towards the blocked-request circuit breaker.
    pub fn is_access_denied(&self) -> bool {
        match self {
            AppError::AccessDenied { .. } => true,
            AppError::Http(e) => e.status() == Some(reqwest::StatusCode::FORBIDDEN),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_classification() {
        let denied = AppError::AccessDenied {
            url: "https://example.com/".into(),
        };
        assert!(denied.is_access_denied());
        assert!(!AppError::request("https://example.com/", "boom").is_access_denied());
        assert!(
            !AppError::Timeout {
                url: "https://example.com/".into(),
                secs: 60
            }
            .is_access_denied()
        );
    }

    #[test]
    fn test_dns_failure_transience() {
        assert!(!DnsFailure::NotFound.is_transient());
        assert!(DnsFailure::Timeout.is_transient());
        assert!(DnsFailure::ServFail.is_transient());
    }
}
