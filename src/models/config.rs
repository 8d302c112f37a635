//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Static crawl behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Rendered (headless browser) crawl behavior
    #[serde(default)]
    pub render: RenderConfig,

    /// Secure port reachability check
    #[serde(default)]
    pub probe: ProbeConfig,

    /// MX lookups
    #[serde(default)]
    pub dns: DnsConfig,

    /// Include/exclude path globs for discovered links
    #[serde(default)]
    pub filters: FilterConfig,

    /// Batch scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Input and report locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_requests_per_crawl == 0 {
            return Err(AppError::validation(
                "crawler.max_requests_per_crawl must be > 0",
            ));
        }
        if self.crawler.page_concurrency == 0 {
            return Err(AppError::validation("crawler.page_concurrency must be > 0"));
        }
        if self.crawler.max_blocked == 0 {
            return Err(AppError::validation("crawler.max_blocked must be > 0"));
        }
        if self.crawler.js_sentinel.is_empty() {
            return Err(AppError::validation("crawler.js_sentinel is empty"));
        }
        if self.render.timeout_secs == 0 {
            return Err(AppError::validation("render.timeout_secs must be > 0"));
        }
        if self.probe.timeout_secs == 0 {
            return Err(AppError::validation("probe.timeout_secs must be > 0"));
        }
        if self.dns.timeout_secs == 0 {
            return Err(AppError::validation("dns.timeout_secs must be > 0"));
        }
        if self.scheduler.concurrency == 0 {
            return Err(AppError::validation("scheduler.concurrency must be > 0"));
        }
        for pattern in self.filters.include.iter().chain(&self.filters.exclude) {
            glob::Pattern::new(pattern).map_err(|e| {
                AppError::validation(format!("invalid path glob '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// HTTP client and static crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Hard cap on requests per crawl phase
    #[serde(default = "defaults::max_requests_per_crawl")]
    pub max_requests_per_crawl: usize,

    /// Pages fetched concurrently within one site crawl
    #[serde(default = "defaults::page_concurrency")]
    pub page_concurrency: usize,

    /// Access-denied responses tolerated before a site crawl is aborted
    #[serde(default = "defaults::max_blocked")]
    pub max_blocked: usize,

    /// Body text marking a page that needs script execution to render
    #[serde(default = "defaults::js_sentinel")]
    pub js_sentinel: String,

    /// Skip TLS certificate verification
    #[serde(default = "defaults::accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_requests_per_crawl: defaults::max_requests_per_crawl(),
            page_concurrency: defaults::page_concurrency(),
            max_blocked: defaults::max_blocked(),
            js_sentinel: defaults::js_sentinel(),
            accept_invalid_certs: defaults::accept_invalid_certs(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Escalate JavaScript-gated sites to a rendered crawl
    #[serde(default = "defaults::render_enabled")]
    pub enabled: bool,

    /// Per-page timeout in seconds
    #[serde(default = "defaults::render_timeout")]
    pub timeout_secs: u64,

    /// Bounded wait for DOM readiness; the page is read anyway when it elapses
    #[serde(default = "defaults::dom_ready_timeout")]
    pub dom_ready_timeout_secs: u64,

    /// Chrome/Chromium executable (auto-detected when unset)
    #[serde(default)]
    pub chrome_executable: Option<String>,

    /// Connect to an already running browser instead of launching one
    #[serde(default)]
    pub remote_debugging_url: Option<String>,
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn dom_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.dom_ready_timeout_secs)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::render_enabled(),
            timeout_secs: defaults::render_timeout(),
            dom_ready_timeout_secs: defaults::dom_ready_timeout(),
            chrome_executable: None,
            remote_debugging_url: None,
        }
    }
}

/// Secure port probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "defaults::probe_port")]
    pub port: u16,

    #[serde(default = "defaults::probe_timeout")]
    pub timeout_secs: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: defaults::probe_port(),
            timeout_secs: defaults::probe_timeout(),
        }
    }
}

/// MX lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Resolver timeout per attempt in seconds
    #[serde(default = "defaults::dns_timeout")]
    pub timeout_secs: u64,

    /// Resolver attempts per query (1 sends each lookup once)
    #[serde(default = "defaults::dns_attempts")]
    pub attempts: usize,

    /// Extra lookups after a transient failure (0 caches the first failure)
    #[serde(default)]
    pub retries: u32,

    /// Initial backoff between retries in milliseconds, doubled each retry
    #[serde(default = "defaults::dns_backoff")]
    pub retry_backoff_ms: u64,
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::dns_timeout(),
            attempts: defaults::dns_attempts(),
            retries: 0,
            retry_backoff_ms: defaults::dns_backoff(),
        }
    }
}

/// Path globs deciding which discovered links are crawled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "defaults::include_globs")]
    pub include: Vec<String>,

    #[serde(default = "defaults::exclude_globs")]
    pub exclude: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: defaults::include_globs(),
            exclude: defaults::exclude_globs(),
        }
    }
}

/// Batch scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Domains processed concurrently (also the batch size)
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::concurrency(),
        }
    }
}

/// Input and report file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::input_file")]
    pub input_file: PathBuf,

    #[serde(default = "defaults::output_file")]
    pub output_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_file: defaults::input_file(),
            output_file: defaults::output_file(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn max_requests_per_crawl() -> usize {
        100
    }
    pub fn page_concurrency() -> usize {
        4
    }
    pub fn max_blocked() -> usize {
        10
    }
    pub fn js_sentinel() -> String {
        "You need to enable JavaScript to run this app".into()
    }
    pub fn accept_invalid_certs() -> bool {
        true
    }

    // Render defaults
    pub fn render_enabled() -> bool {
        true
    }
    pub fn render_timeout() -> u64 {
        120
    }
    pub fn dom_ready_timeout() -> u64 {
        15
    }

    // Probe defaults
    pub fn probe_port() -> u16 {
        443
    }
    pub fn probe_timeout() -> u64 {
        5
    }

    // DNS defaults
    pub fn dns_timeout() -> u64 {
        5
    }
    pub fn dns_attempts() -> usize {
        1
    }
    pub fn dns_backoff() -> u64 {
        250
    }

    // Scheduler defaults
    pub fn concurrency() -> usize {
        5
    }

    // Path defaults
    pub fn input_file() -> PathBuf {
        "in.csv".into()
    }
    pub fn output_file() -> PathBuf {
        "out.csv".into()
    }

    // Filter defaults
    pub fn include_globs() -> Vec<String> {
        [
            "**/*.html",
            "**/*.htm",
            "**/",
            "**/*.php",
            "**/*.asp",
            "**/*.aspx",
            "**/*.jsp",
            "**/contact*",
            "**/about*",
            "**/team*",
            "**/staff*",
            "**/aviso*",
            "**/legal*",
            "**/privacy*",
            "**/politica*",
            "**/blog/**",
            "**/news/**",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn exclude_globs() -> Vec<String> {
        const IMAGES: &[&str] = &[
            "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "psd", "ai",
            "eps", "heic", "heif",
        ];
        const STYLES_AND_FONTS: &[&str] =
            &["css", "scss", "less", "woff", "woff2", "ttf", "otf", "eot"];
        const SCRIPTS: &[&str] = &["js", "mjs", "ts", "json", "geojson", "wasm"];
        const MEDIA: &[&str] = &[
            "mp4", "m4v", "mov", "avi", "wmv", "flv", "mkv", "webm", "mpeg", "mpg", "mp3", "m4a",
            "wav", "flac", "ogg", "oga",
        ];
        const DOCUMENTS: &[&str] = &[
            "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf",
        ];
        const ARCHIVES: &[&str] = &[
            "zip", "rar", "7z", "tar", "tgz", "tar.gz", "bz2", "gz", "xz", "dmg", "iso", "exe",
            "msi", "bin", "swf", "class", "jar",
        ];
        const EXTENSIONS: &[&[&str]] =
            &[IMAGES, STYLES_AND_FONTS, SCRIPTS, MEDIA, DOCUMENTS, ARCHIVES];
        EXTENSIONS
            .iter()
            .flat_map(|group| group.iter())
            .map(|ext| format!("**/*.{ext}"))
            .collect()
    }
}
