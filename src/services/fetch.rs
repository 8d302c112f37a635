//! Page sources: how a crawl obtains the content of a URL.
//!
//! The static and rendered crawls share discovery and extraction; they only
//! differ in the [`PageSource`] they use.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Page};
use crate::utils::http::{self, create_async_client};

/// Strategy for fetching one page.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Upper bound for a single [`PageSource::fetch`] call.
    fn request_timeout(&self) -> Duration;

    /// Fetch `url`. Access-denied responses must map to [`AppError::AccessDenied`].
    async fn fetch(&self, url: &Url) -> Result<Page>;
}

/// Plain HTTP GET of the raw page body.
pub struct StaticFetcher {
    client: Client,
    timeout: Duration,
}

impl StaticFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl PageSource for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, url: &Url) -> Result<Page> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout {
                        url: url.to_string(),
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    AppError::request(url.as_str(), e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(AppError::AccessDenied {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AppError::request(url.as_str(), format!("HTTP {status}")));
        }

        let content_type = http::content_type(response.headers());
        if !http::is_markup(&content_type) {
            return Err(AppError::request(
                url.as_str(),
                format!("unsupported content type '{content_type}'"),
            ));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::request(url.as_str(), e))?;

        Ok(Page::new(final_url, body))
    }
}
