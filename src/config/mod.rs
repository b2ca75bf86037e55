//! Configuration module for Topic-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and supplies the default target source backed by the `[[target]]` entries.
//!
//! # Example
//!
//! ```no_run
//! use topic_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} targets", config.targets.len());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, DomainEntry, OutputConfig, RelevanceMode, Target, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

use crate::HarvestError;

/// Source of seed targets (the site registry contract)
///
/// The engine only reads from a source; it never mutates the returned
/// collection. An error here is a run-level failure: the run produces no
/// records and the caller decides whether to retry the whole run.
pub trait TargetSource {
    fn targets(&self) -> Result<Vec<Target>, HarvestError>;
}

impl TargetSource for Config {
    fn targets(&self) -> Result<Vec<Target>, HarvestError> {
        Ok(self.targets.clone())
    }
}

impl TargetSource for Vec<Target> {
    fn targets(&self) -> Result<Vec<Target>, HarvestError> {
        Ok(self.clone())
    }
}
