//! JSON file sink
//!
//! Writes every record of a run as one pretty-printed JSON array, the artifact
//! handed to the downstream uploader.

use crate::output::{OutputResult, PageRecord, RecordEntry, RecordSink, RunSummary};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes records to a JSON file, replacing any previous content
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonFileSink {
    fn write(&self, records: &[PageRecord], summary: &RunSummary) -> OutputResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries: Vec<RecordEntry<'_>> = records.iter().map(PageRecord::entry).collect();

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &entries)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(
            "Wrote {} records to {}{}",
            records.len(),
            self.path.display(),
            if summary.cancelled { " (partial run)" } else { "" }
        );

        Ok(())
    }
}
