use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for shelf-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub scraper: ScraperConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

/// Log level and destination
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files (used for levels above debug)
    #[serde(rename = "logs-dir", default = "default_logs_dir")]
    pub logs_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Listing endpoint and crawl behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Listing page URL, without the pagination query
    pub url: String,

    /// Query appended to `url`; `{page}` is replaced by the page number
    #[serde(rename = "page-query", default = "default_page_query")]
    pub page_query: String,

    /// Path of the resume checkpoint file
    #[serde(rename = "state-file", default = "default_state_file")]
    pub state_file: String,

    /// Pause before re-entering the sync loop after a failed pass (seconds)
    #[serde(rename = "restart-delay-secs", default = "default_restart_delay")]
    pub restart_delay_secs: u64,

    #[serde(default)]
    pub fetcher: FetcherConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl ScraperConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}

/// HTTP fetch policy
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Attempts per URL before giving up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause after a failed attempt (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Pause after every successful response (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,

    /// Headers sent with every request
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            request_delay_ms: default_request_delay(),
            timeout_secs: default_timeout(),
            headers: default_headers(),
        }
    }
}

/// CSS selectors describing the catalog page layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// One element per product card on a listing page
    pub item: String,

    /// Product link inside a card; its text is the product name
    pub link: String,

    pub description: String,

    pub price: String,

    /// Attribute of the price element holding the price
    #[serde(rename = "price-attribute")]
    pub price_attribute: String,

    /// Pagination counter, e.g. "24 of 96"
    pub counter: String,

    /// Container of the size table on a detail page
    #[serde(rename = "detail-table")]
    pub detail_table: String,

    /// Product code inside the detail container
    #[serde(rename = "item-code")]
    pub item_code: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            item: "#productFilterList > div > div.container.p-0 > div > div > div".to_string(),
            link: "div.card-body > div.itemInfo.v2-b > a".to_string(),
            description: "div.card-body > div.itemInfo.v2-b > h4".to_string(),
            price: "div.itemPrice-wrapper p.itemNormalPrice span[data-price]".to_string(),
            price_attribute: "data-price".to_string(),
            counter: "span.showing_current_max".to_string(),
            detail_table: "#modal-product-size".to_string(),
            item_code: "span.item-code".to_string(),
        }
    }
}

/// Storage target
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; the extension (.db, .jsonl, .xlsx) selects the backend
    #[serde(rename = "file-path")]
    pub file_path: String,

    /// Item fields that identify a stored product
    #[serde(rename = "identity-key", default = "default_identity_key")]
    pub identity_key: Vec<String>,
}

/// SMTP settings for completion and interruption mails
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub username: String,

    #[serde(rename = "app-password")]
    pub app_password: String,

    /// Recipients separated by `;` or `,`
    pub recipients: String,

    #[serde(rename = "smtp-server", default = "default_smtp_server")]
    pub smtp_server: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_page_query() -> String {
    "?&product-room=product&page={page}&order=RECOMMENDED".to_string()
}

fn default_state_file() -> String {
    "ikea_scraper_state.json".to_string()
}

fn default_restart_delay() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_request_delay() -> u64 {
    2000
}

fn default_timeout() -> u64 {
    30
}

fn default_identity_key() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

/// Browser-like headers the catalog expects
pub fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "lt"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
