use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for Topic-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub blacklist: Vec<DomainEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of worker tasks fetching in parallel
    pub concurrency: u32,

    /// Timeout for a single fetch attempt (milliseconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Maximum attempts per URL, including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds), doubled on each retry
    #[serde(rename = "base-delay", default = "default_base_delay")]
    pub base_delay: u64,

    /// Upper bound for any single backoff delay (milliseconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: u64,

    /// Add random jitter to backoff delays
    #[serde(default)]
    pub jitter: bool,

    /// Link discovery runs on pages shallower than this depth (seeds are depth 0)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Which relevance predicate the link discoverer applies
    #[serde(default)]
    pub relevance: RelevanceMode,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_depth() -> u32 {
    1
}

/// Relevance predicate selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelevanceMode {
    /// Keep links whose host, path or anchor text mention the topic
    #[default]
    Topic,
    /// Keep every link
    All,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON artifact handed to the uploader
    #[serde(rename = "json-path")]
    pub json_path: String,
}

/// A seed page and the topic its related links are collected for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub topic: String,
}

impl Target {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: topic.into(),
        }
    }
}

/// Domain entry for the blacklist
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}
