// src/utils/http.rs

//! HTTP client utilities.

use reqwest::header::{CONTENT_TYPE, HeaderMap};

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?;
    Ok(client)
}

/// Lowercased `Content-Type` header, empty when absent.
pub fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_lowercase()
}

/// Whether a response body is markup the crawler can parse.
///
/// HTML, XHTML and XML feeds are accepted. A missing header is given the
/// benefit of the doubt.
pub fn is_markup(content_type: &str) -> bool {
    content_type.is_empty() || content_type.contains("html") || content_type.contains("xml")
}
