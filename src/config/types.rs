use serde::Deserialize;

/// Main configuration structure
///
/// Every section has defaults so the pipeline can run without a file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub translation: Option<TranslationConfig>,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteEntry>,
}

impl Config {
    /// Base URL override for an adapter, if one is configured
    pub fn site_base_url(&self, adapter: &str) -> Option<&str> {
        self.sites
            .iter()
            .find(|site| site.name == adapter)
            .map(|site| site.base_url.as_str())
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Minimum time between two requests to the same source (milliseconds)
    #[serde(rename = "min-request-interval-ms")]
    pub min_request_interval_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Consecutive failed listing pages before an adapter is declared dead
    #[serde(rename = "max-consecutive-page-failures")]
    pub max_consecutive_page_failures: u32,

    /// Upper bound on adapters crawled at the same time
    #[serde(rename = "max-concurrent-adapters")]
    pub max_concurrent_adapters: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 2000,
            request_timeout_secs: 30,
            max_consecutive_page_failures: 3,
            max_concurrent_adapters: 4,
        }
    }
}

/// Backoff settings for transient fetch failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 10_000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,

    #[serde(rename = "contact-email")]
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "JapanHouseIngest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        let contact: Vec<String> = self
            .contact_url
            .iter()
            .map(|url| format!("+{}", url))
            .chain(self.contact_email.iter().cloned())
            .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./japanhouse.db".to_string(),
        }
    }
}

/// Image-quality thresholds applied when enforcement is switched on
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    #[serde(rename = "min-count")]
    pub min_count: usize,

    /// Minimum width, checked only against width hints carried in image URLs
    #[serde(rename = "min-width")]
    pub min_width: Option<u32>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            min_count: 1,
            min_width: None,
        }
    }
}

/// LibreTranslate-compatible translation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    pub endpoint: String,

    #[serde(default = "default_source_language", rename = "source-language")]
    pub source_language: String,

    #[serde(default = "default_target_language", rename = "target-language")]
    pub target_language: String,

    #[serde(default, rename = "api-key")]
    pub api_key: Option<String>,
}

fn default_source_language() -> String {
    "ja".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

/// Per-site base URL override (mirrors, staging hosts, tests)
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    pub name: String,

    #[serde(rename = "base-url")]
    pub base_url: String,
}
