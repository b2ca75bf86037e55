//! Run summary statistics
//!
//! This module provides the counters reported at the end of every run and
//! their console rendering.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Targets supplied by the target source
    pub targets: usize,

    /// Pages fetched and extracted into records
    pub pages: usize,

    /// URLs in the invalid set (permanent fetch failures and malformed URLs)
    pub invalid_urls: usize,

    /// Pages fetched but skipped by the content extractor
    pub parse_skipped: usize,

    /// Jobs or candidates skipped because their URL was already seen
    pub duplicates: usize,

    /// Jobs dropped or interrupted by cancellation
    pub abandoned: usize,

    /// Distinct URLs claimed for fetching
    pub visited: usize,

    /// The run was cancelled before the queue drained
    pub cancelled: bool,

    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Share of visited URLs that produced a record, in percent
    pub fn success_rate(&self) -> f64 {
        if self.visited == 0 {
            0.0
        } else {
            (self.pages as f64 / self.visited as f64) * 100.0
        }
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    if let Some(started_at) = summary.started_at {
        println!("Started: {}", started_at.to_rfc3339());
    }
    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    if summary.cancelled {
        println!("Status: cancelled (partial results)");
    } else {
        println!("Status: completed");
    }
    println!();

    println!("Overview:");
    println!("  Targets: {}", summary.targets);
    println!("  URLs visited: {}", summary.visited);
    println!("  Pages harvested: {}", summary.pages);
    println!();

    println!("Skipped:");
    println!("  Invalid URLs: {}", summary.invalid_urls);
    println!("  Unparseable pages: {}", summary.parse_skipped);
    println!("  Duplicates: {}", summary.duplicates);
    if summary.abandoned > 0 {
        println!("  Abandoned: {}", summary.abandoned);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} URLs harvested)",
        summary.success_rate(),
        summary.pages,
        summary.visited
    );
}
