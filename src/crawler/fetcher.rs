//! HTTP fetching
//!
//! This module handles all network access for the crawler:
//! - Building the shared HTTP client with the configured user agent
//! - Classifying responses and network errors into [`FetchError`]
//! - [`SiteSession`], the per-adapter request loop combining rate limiting,
//!   retries and cancellation

use crate::config::UserAgentConfig;
use crate::crawler::{RetryPolicy, Throttle};
use crate::FetchError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// The client is built once per run and cloned into every adapter worker;
/// clones share the connection pool.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use japanhouse_ingest::config::UserAgentConfig;
/// use japanhouse_ingest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success status onto the error taxonomy
///
/// | Status | Error |
/// |--------|-------|
/// | 2xx | none |
/// | 401, 403 | `Blocked` (the source refuses us) |
/// | 408, 429, 5xx | `Transient` (worth a retry) |
/// | anything else | `Status` (final for this page) |
pub fn classify_status(url: &Url, status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let url = url.to_string();
    let code = status.as_u16();

    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Blocked { url, status: code },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => FetchError::Transient {
            url,
            reason: format!("HTTP {}", code),
        },
        s if s.is_server_error() => FetchError::Transient {
            url,
            reason: format!("HTTP {}", code),
        },
        _ => FetchError::Status { url, status: code },
    })
}

fn classify_network_error(url: &Url, error: &reqwest::Error) -> FetchError {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    };

    FetchError::Transient {
        url: url.to_string(),
        reason,
    }
}

/// Performs one GET request and returns the body
///
/// No retries happen here; see [`SiteSession::get`].
pub async fn fetch_page(client: &Client, url: &Url) -> Result<String, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_network_error(url, &e))?;

    let status = response.status();
    trace!(url = %url, status = status.as_u16(), "response");

    if let Some(error) = classify_status(url, status) {
        return Err(error);
    }

    response
        .text()
        .await
        .map_err(|e| classify_network_error(url, &e))
}

/// One adapter's view of the network
///
/// Every request goes through the adapter's own throttle, is retried under
/// the retry policy, and is abandoned as soon as the run is cancelled.
pub struct SiteSession {
    client: Client,
    throttle: Throttle,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl SiteSession {
    pub fn new(
        client: Client,
        throttle: Throttle,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            throttle,
            retry,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Requests sent so far, retries included
    pub fn requests_sent(&self) -> u32 {
        self.throttle.request_count()
    }

    /// Fetches a page, retrying transient failures
    pub async fn get(&mut self, url: &Url) -> Result<String, FetchError> {
        let mut attempt = 1;

        loop {
            self.throttle.acquire(&self.cancel).await?;
            debug!(url = %url, attempt, "GET");

            let result = tokio::select! {
                _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
                result = fetch_page(&self.client, url) => result,
            };

            let error = match result {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            match self.retry.next_delay(attempt, &error) {
                Some(delay) => {
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient fetch failure, retrying"
                    );
                    self.retry.sleep(delay, &self.cancel).await?;
                    attempt += 1;
                }
                None => return Err(error),
            }
        }
    }
}
