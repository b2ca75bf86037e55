//! Page records and their serialized form

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The unit of harvest output; immutable once emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Normalized URL of the page
    pub url: String,

    pub title: String,
    pub description: String,
    pub body: String,

    /// When the page content was extracted
    pub scraped_at: DateTime<Utc>,

    /// Topic of the seed the page was reached from
    pub source: String,
}

/// JSON shape of one record
///
/// ```json
/// {
///   "url": "https://example.ch/mobile/plans",
///   "data": { "title": "...", "description": "...", "body": "..." },
///   "scraped_at": "2024-05-01T06:00:00Z",
///   "source": "Mobile",
///   "version": "0.1.0"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct RecordEntry<'a> {
    pub url: &'a str,
    pub data: RecordData<'a>,
    pub scraped_at: DateTime<Utc>,
    pub source: &'a str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RecordData<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub body: &'a str,
}

impl PageRecord {
    /// Borrowed serializable view, stamped with the crate version
    pub fn entry(&self) -> RecordEntry<'_> {
        RecordEntry {
            url: &self.url,
            data: RecordData {
                title: &self.title,
                description: &self.description,
                body: &self.body,
            },
            scraped_at: self.scraped_at,
            source: &self.source,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
