//! Headless browser page source.
//!
//! One browser is started lazily on first use and shared by every rendered
//! crawl of the run. Each fetch opens a fresh tab and closes it afterwards.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Page, RenderConfig};
use crate::services::PageSource;

/// Reads the navigation status and the live `mailto:` targets of the page.
const SNAPSHOT_SCRIPT: &str = r#"(() => {
    const nav = performance.getEntriesByType('navigation')[0];
    return {
        status: (nav && nav.responseStatus) || 0,
        mailto: Array.from(document.querySelectorAll('a[href]'))
            .map((a) => a.getAttribute('href') || '')
            .filter((href) => href.trim().toLowerCase().startsWith('mailto:')),
    };
})()"#;

#[derive(Debug, Default, Deserialize)]
struct DomSnapshot {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    mailto: Vec<String>,
}

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn start(config: &RenderConfig) -> Result<Self> {
        let (browser, mut handler) = match &config.remote_debugging_url {
            Some(url) => {
                log::info!("Connecting to browser at {url}");
                Browser::connect(url.clone())
                    .await
                    .map_err(AppError::render)?
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(config.timeout())
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage");
                if let Some(path) = &config.chrome_executable {
                    builder = builder.chrome_executable(path);
                }
                let browser_config = builder.build().map_err(AppError::render)?;
                log::info!("Launching headless browser");
                Browser::launch(browser_config)
                    .await
                    .map_err(AppError::render)?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser event error: {e}");
                }
            }
        });

        Ok(Self { browser, handler })
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Closes a resource when released, or from a spawned task when dropped early.
///
/// A fetch future can be dropped at any await point (request timeout, an
/// aborted crawl), so the tab it opened must not depend on the fetch finishing.
struct CloseOnDrop<T: Send + 'static> {
    item: Option<T>,
    close: fn(T) -> BoxFuture<'static, ()>,
}

impl<T: Send + 'static> CloseOnDrop<T> {
    fn new(item: T, close: fn(T) -> BoxFuture<'static, ()>) -> Self {
        Self {
            item: Some(item),
            close,
        }
    }

    async fn close(mut self) {
        if let Some(item) = self.item.take() {
            (self.close)(item).await;
        }
    }
}

impl<T: Send + 'static> Drop for CloseOnDrop<T> {
    fn drop(&mut self) {
        let Some(item) = self.item.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn((self.close)(item));
            }
            Err(_) => log::debug!("No runtime left to close a browser tab"),
        }
    }
}

fn close_tab(tab: chromiumoxide::Page) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if let Err(e) = tab.close().await {
            log::debug!("Failed to close tab: {e}");
        }
    })
}

/// Page source that renders pages in headless Chromium.
pub struct RenderedFetcher {
    config: RenderConfig,
    session: OnceCell<BrowserSession>,
}

impl RenderedFetcher {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<&BrowserSession> {
        self.session
            .get_or_try_init(|| BrowserSession::start(&self.config))
            .await
    }

    async fn read_page(&self, tab: &chromiumoxide::Page, url: &Url) -> Result<Page> {
        match tokio::time::timeout(self.config.dom_ready_timeout(), tab.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(AppError::request(url.as_str(), e)),
            Err(_) => log::debug!(
                "{url} not ready after {:?}, reading it anyway",
                self.config.dom_ready_timeout()
            ),
        }

        let snapshot: DomSnapshot = tab
            .evaluate_expression(SNAPSHOT_SCRIPT)
            .await
            .map_err(AppError::render)?
            .into_value()
            .map_err(AppError::render)?;

        match snapshot.status {
            403 => {
                return Err(AppError::AccessDenied {
                    url: url.to_string(),
                });
            }
            status if status >= 400 => {
                return Err(AppError::request(url.as_str(), format!("HTTP {status}")));
            }
            _ => {}
        }

        let body = tab.content().await.map_err(AppError::render)?;
        let final_url = tab
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|current| Url::parse(&current).ok())
            .unwrap_or_else(|| url.clone());

        let mut page = Page::new(final_url, body);
        page.mail_links = snapshot.mailto;
        Ok(page)
    }
}

#[async_trait]
impl PageSource for RenderedFetcher {
    fn name(&self) -> &'static str {
        "rendered"
    }

    fn request_timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn fetch(&self, url: &Url) -> Result<Page> {
        let session = self.session().await?;
        let tab = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(AppError::render)?;

        let guard = CloseOnDrop::new(tab.clone(), close_tab);
        let result = self.read_page(&tab, url).await;
        guard.close().await;
        result
    }
}
