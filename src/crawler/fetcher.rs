//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured header set
//! - GET requests with a fixed retry budget per URL
//! - Throttling after every successful response

use crate::config::FetcherConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to retrieve content from {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid HTTP client configuration: {0}")]
    Client(String),
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct Document {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code (always 2xx)
    pub status: u16,

    /// Page body
    pub body: String,
}

/// Retry and throttling policy for one URL
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Attempts before the URL is given up
    pub max_attempts: u32,

    /// Pause after a failed attempt
    pub retry_delay: Duration,

    /// Pause after every successful response
    pub request_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(1),
            request_delay: Duration::from_secs(2),
        }
    }
}

impl From<&FetcherConfig> for FetchPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }
}

/// Builds an HTTP client that sends the configured headers with every request
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError::Client)` - A header could not be encoded or the client failed to build
///
/// # Example
///
/// ```no_run
/// use shelf_harvest::config::FetcherConfig;
/// use shelf_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Client(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Client(format!("header '{}': {}", name, e)))?;
        headers.insert(name, value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// HTTP GET with a bounded retry budget
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Wait `request_delay`, return the body |
/// | Any other status | Log, wait `retry_delay`, retry |
/// | Transport error / unreadable body | Log, wait `retry_delay`, retry |
/// | `max_attempts` failures | `FetchError::Exhausted` |
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher from configuration
    pub fn from_config(config: &FetcherConfig) -> Result<Self, FetchError> {
        Ok(Self::new(build_http_client(config)?, FetchPolicy::from(config)))
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetches `url`, retrying failed attempts with the same URL and headers
    pub async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let attempts = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    let final_url = response.url().to_string();
                    match response.text().await {
                        Ok(body) => {
                            tokio::time::sleep(self.policy.request_delay).await;
                            return Ok(Document {
                                url: final_url,
                                status,
                                body,
                            });
                        }
                        Err(e) => last_error = format!("failed to read body: {}", e),
                    }
                }
                Ok(response) => {
                    last_error = format!("status code: {}", response.status().as_u16());
                }
                Err(e) => last_error = describe_transport_error(&e),
            }

            tracing::error!(
                "[Attempt {}] Failed to fetch URL: {}, {}",
                attempt,
                url,
                last_error
            );

            if attempt < attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
