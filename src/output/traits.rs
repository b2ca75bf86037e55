//! Record sink trait and output errors
//!
//! A sink receives the finished records of a run (the uploader contract). The
//! engine never depends on a concrete sink.

use crate::output::{PageRecord, RunSummary};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize records: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for the records of a finished run
pub trait RecordSink {
    /// Writes all records of a run
    ///
    /// Called once per run, also for cancelled runs with partial results.
    fn write(&self, records: &[PageRecord], summary: &RunSummary) -> OutputResult<()>;
}

/// Sink that keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: std::sync::Mutex<Vec<PageRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PageRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl RecordSink for MemorySink {
    fn write(&self, records: &[PageRecord], _summary: &RunSummary) -> OutputResult<()> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(records);
        Ok(())
    }
}
