//! Output module for harvest results
//!
//! This module handles:
//! - The page record type and its JSON shape
//! - The record sink contract and the JSON file sink
//! - Run summary statistics

mod json;
mod record;
pub mod stats;
mod traits;

pub use json::JsonFileSink;
pub use record::{PageRecord, RecordData, RecordEntry};
pub use stats::{print_summary, RunSummary};
pub use traits::{MemorySink, OutputError, OutputResult, RecordSink};
