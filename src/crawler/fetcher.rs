//! HTTP fetcher implementation
//!
//! This module handles the single network attempt the retry controller builds on:
//! - Building the shared HTTP client with a proper user agent string
//! - One GET per call, bounded by a timeout covering send and body read
//! - Error classification into network, timeout, HTTP status and redirect failures
//!
//! Retrying is not done here; see the `retry` module.

use crate::config::UserAgentConfig;
use crate::url::NormalizedUrl;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, RequestBuilder};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed within one attempt
const MAX_REDIRECTS: usize = 10;

/// A successfully received response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code (2xx or 3xx)
    pub status_code: u16,

    /// Content-Type header value, if the server sent one
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

/// Classified failure of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// DNS failure, connection refused, TLS error or broken body stream
    #[error("network error: {0}")]
    Network(String),

    /// The attempt did not finish within its timeout
    #[error("request timed out")]
    Timeout,

    /// A 4xx or 5xx response was received
    #[error("HTTP {status_code}")]
    Http {
        status_code: u16,
        /// Server-provided `Retry-After` hint
        retry_after: Option<Duration>,
    },

    /// Redirect loop or a chain longer than the hop limit
    #[error("redirect error: {0}")]
    Redirect(String),
}

impl FetchError {
    /// Short machine-friendly name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Timeout => "timeout",
            Self::Http { .. } => "http_error",
            Self::Redirect(_) => "redirect_error",
        }
    }
}

/// Result of a single fetch attempt
pub type FetchResult = Result<FetchedPage, FetchError>;

/// Builds the HTTP client shared by every fetch of the process
///
/// The client owns a bounded pool of idle connections that is reused across
/// runs; nothing needs tearing down between runs.
///
/// # Example
///
/// ```no_run
/// use topic_harvester::config::UserAgentConfig;
/// use topic_harvester::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "TopicHarvester".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs exactly one GET attempt against `url`
///
/// # Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx / 3xx | `Ok(FetchedPage)` |
/// | 4xx / 5xx | `FetchError::Http` (with `Retry-After` if present) |
/// | Timeout (send or body) | `FetchError::Timeout` |
/// | Redirect loop / too many hops | `FetchError::Redirect` |
/// | DNS, connect, TLS, body errors | `FetchError::Network` |
pub async fn fetch_url(client: &Client, url: &NormalizedUrl, timeout: Duration) -> FetchResult {
    let request = client.get(url.as_url().clone()).timeout(timeout);

    // reqwest's own timeout covers the request; the outer one also bounds the
    // body read so a slow-dripping server cannot hold a worker indefinitely.
    match tokio::time::timeout(timeout, send_and_read(request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

async fn send_and_read(request: RequestBuilder) -> FetchResult {
    let response = request.send().await.map_err(|e| classify_error(&e))?;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::Http {
            status_code: status.as_u16(),
            retry_after: retry_after_hint(response.headers()),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.bytes().await.map_err(|e| classify_error(&e))?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body: body.to_vec(),
    })
}

fn classify_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::Redirect(error.to_string())
    } else {
        FetchError::Network(error.to_string())
    }
}

fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

/// Parses a `Retry-After` header value
///
/// Accepts delta-seconds (`"120"`) or an HTTP date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`); dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
