//! Crawler module for page fetching and processing
//!
//! This module contains the core harvesting logic, including:
//! - Single-attempt HTTP fetching with failure classification
//! - Retry with bounded exponential backoff
//! - Link discovery and content extraction
//! - The shared job queue and the worker pool that drains it

mod coordinator;
mod extractor;
mod fetcher;
mod parser;
mod retry;
mod scheduler;

pub use coordinator::{run_harvest, Harvester, RunReport};
pub use extractor::{extract, is_html_content_type, PageContent};
pub use fetcher::{
    build_http_client, fetch_url, parse_retry_after, FetchError, FetchResult, FetchedPage,
};
pub use parser::{
    discover, relevance_filter, AcceptAll, Candidate, Candidates, RelevanceFilter, TopicMatch,
};
pub use retry::{
    decide, fetch_with_retry, retry_with, RetryDecision, RetryOutcome, RetryPolicy, RetryResult,
};
pub use scheduler::{CompletionGuard, Job, JobQueue};
