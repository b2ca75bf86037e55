//! Topic-Harvester: a bounded-concurrency topic page harvester
//!
//! This crate fetches seed pages, discovers topic-related links on them, fetches
//! every candidate under a fixed worker budget with retry and backoff, and
//! extracts title, description and body text into page records.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Run-level error type for Topic-Harvester operations
///
/// Per-URL failures never surface here; they are contained inside the run and
/// reported through the run summary.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Target registry unavailable: {0}")]
    Registry(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors (the "invalid URL" class; never retried)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Content-level extraction errors
///
/// A parse error skips the page; it never stops the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Response body is empty")]
    Empty,

    #[error("Content is not HTML: {content_type}")]
    NotHtml { content_type: String },

    #[error("No extractable content")]
    NoContent,
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::{Config, Target};
pub use crawler::{Harvester, RunReport};
pub use output::{PageRecord, RunSummary};
pub use url::{normalize_url, NormalizedUrl};
