//! Harvest coordinator - run orchestration
//!
//! This module contains the worker pool that drives a run:
//! - Seeding the job queue from the target source
//! - Claiming, fetching (with retry) and extracting each job
//! - Discovering and enqueueing related links below the depth limit
//! - Collecting page records and building the run summary
//!
//! All run state (tracker, queue, collector) is created per run and dropped at
//! its end. Only the HTTP client outlives a run.

use crate::config::{Config, CrawlerConfig, DomainEntry, Target, TargetSource};
use crate::crawler::extractor::{extract, is_html_content_type};
use crate::crawler::fetcher::{build_http_client, FetchedPage};
use crate::crawler::parser::{discover, relevance_filter, RelevanceFilter};
use crate::crawler::retry::{fetch_with_retry, RetryPolicy, RetryResult};
use crate::crawler::scheduler::{Job, JobQueue};
use crate::output::{PageRecord, RunSummary};
use crate::state::{Claim, RunTracker};
use crate::url::{is_blacklisted, normalize_url};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Records and summary of one finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<PageRecord>,
    pub summary: RunSummary,
}

/// Main harvester structure
///
/// Owns the HTTP client and the run parameters. A harvester can execute any
/// number of runs, sequentially or concurrently; runs share nothing but the
/// client's connection pool.
pub struct Harvester {
    client: Client,
    crawler: CrawlerConfig,
    retry: RetryPolicy,
    blacklist: Arc<[DomainEntry]>,
    filter: Arc<dyn RelevanceFilter>,
    clock: fn() -> DateTime<Utc>,
}

impl Harvester {
    /// Creates a new harvester from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent)?;

        Ok(Self {
            client,
            crawler: config.crawler.clone(),
            retry: RetryPolicy::from_config(&config.crawler),
            blacklist: Arc::from(config.blacklist.clone()),
            filter: relevance_filter(config.crawler.relevance),
            clock: Utc::now,
        })
    }

    /// Replaces the relevance filter used during discovery
    pub fn with_filter(mut self, filter: Arc<dyn RelevanceFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Replaces the clock used to stamp records
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Reads targets from `source` and runs a harvest over them
    ///
    /// A failing target source aborts the run before any fetch.
    pub async fn harvest<S>(
        &self,
        source: &S,
        cancel: CancellationToken,
    ) -> Result<RunReport, HarvestError>
    where
        S: TargetSource + ?Sized,
    {
        let targets = source.targets().map_err(|e| {
            tracing::error!("Failed to read targets: {}", e);
            e
        })?;

        Ok(self.run(&targets, cancel).await)
    }

    /// Runs a harvest over `targets`
    ///
    /// Per-URL failures never fail the run; they are reflected in the summary.
    /// Cancelling `cancel` stops dispatch and returns the records obtained so far.
    pub async fn run(&self, targets: &[Target], cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        let started_at = (self.clock)();
        let concurrency = self.crawler.concurrency.max(1);

        tracing::info!(
            "Starting harvest of {} targets with {} workers",
            targets.len(),
            concurrency
        );

        let ctx = Arc::new(self.context(cancel.clone()));

        ctx.seed(targets);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let workers: Vec<_> = (0..concurrency)
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                let tx = tx.clone();
                tokio::spawn(worker_loop(id, ctx, tx))
            })
            .collect();
        drop(tx);

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }

        let counts = ctx.tracker.counts();
        let summary = RunSummary {
            targets: targets.len(),
            pages: records.len(),
            invalid_urls: counts.invalid,
            parse_skipped: counts.parse_skipped,
            duplicates: counts.duplicates,
            abandoned: counts.abandoned + ctx.queue.abandoned(),
            visited: counts.visited,
            cancelled: cancel.is_cancelled(),
            started_at: Some(started_at),
            elapsed: started.elapsed(),
        };

        if summary.cancelled {
            tracing::warn!(
                "Harvest cancelled: {} pages harvested, {} jobs abandoned",
                summary.pages,
                summary.abandoned
            );
        } else {
            tracing::info!(
                "Harvest completed: {} pages harvested, {} invalid URLs in {:?}",
                summary.pages,
                summary.invalid_urls,
                summary.elapsed
            );
        }

        RunReport { records, summary }
    }

    /// Fresh run-scoped state
    fn context(&self, cancel: CancellationToken) -> RunContext {
        RunContext {
            client: self.client.clone(),
            retry: self.retry.clone(),
            timeout: self.crawler.request_timeout(),
            max_depth: self.crawler.max_depth,
            blacklist: Arc::clone(&self.blacklist),
            filter: Arc::clone(&self.filter),
            clock: self.clock,
            tracker: RunTracker::new(),
            queue: JobQueue::new(cancel.clone()),
            cancel,
        }
    }
}

/// Shared, run-scoped state handed to every worker
struct RunContext {
    client: Client,
    retry: RetryPolicy,
    timeout: Duration,
    max_depth: u32,
    blacklist: Arc<[DomainEntry]>,
    filter: Arc<dyn RelevanceFilter>,
    clock: fn() -> DateTime<Utc>,
    tracker: RunTracker,
    queue: JobQueue,
    cancel: CancellationToken,
}

async fn worker_loop(id: u32, ctx: Arc<RunContext>, records: mpsc::UnboundedSender<PageRecord>) {
    while let Some(job) = ctx.queue.next().await {
        let _guard = ctx.queue.completion_guard();

        if let Some(record) = ctx.process(job).await {
            // The receiver lives until every worker has exited
            let _ = records.send(record);
        }
    }

    tracing::trace!("Worker {} finished", id);
}

impl RunContext {
    /// Enqueues every valid target as a depth-0 job
    fn seed(&self, targets: &[Target]) {
        for target in targets {
            match normalize_url(&target.url) {
                Ok(url) => {
                    if !self.tracker.try_enqueue(&url) {
                        tracing::debug!("Duplicate target URL {}", url);
                        self.tracker.record_duplicate();
                        continue;
                    }
                    self.queue
                        .push(Job::new(url, Arc::from(target.topic.as_str()), 0));
                }
                Err(e) => {
                    tracing::warn!("Invalid target URL {}: {}", target.url, e);
                    self.tracker.mark_invalid(&target.url);
                }
            }
        }
    }

    /// Processes a single job
    ///
    /// This method:
    /// 1. Claims the URL (skips it if visited or known invalid)
    /// 2. Fetches the page with retry
    /// 3. Discovers related links when below the depth limit
    /// 4. Extracts the page content into a record
    async fn process(&self, job: Job) -> Option<PageRecord> {
        match self.tracker.claim(&job.url) {
            Claim::Claimed => {}
            Claim::AlreadyVisited => {
                tracing::debug!("Skipping already visited URL: {}", job.url);
                self.tracker.record_duplicate();
                return None;
            }
            Claim::KnownInvalid => {
                tracing::debug!("Skipping known invalid URL: {}", job.url);
                return None;
            }
        }

        tracing::debug!("Processing URL: {} (depth {})", job.url, job.depth);

        let outcome =
            fetch_with_retry(&self.client, &job.url, &self.retry, self.timeout, &self.cancel).await;

        match outcome.result {
            RetryResult::Success(page) => self.handle_page(&job, page),
            RetryResult::PermanentFailure(error) => {
                tracing::warn!(
                    "Giving up on {} after {} attempt(s) [{}]: {}",
                    job.url,
                    outcome.attempts,
                    error.kind(),
                    error
                );
                self.tracker.mark_invalid(job.url.as_str());
                None
            }
            RetryResult::Cancelled => {
                tracing::debug!("Fetch of {} cancelled", job.url);
                self.tracker.record_abandoned(1);
                None
            }
        }
    }

    fn handle_page(&self, job: &Job, page: FetchedPage) -> Option<PageRecord> {
        if job.depth < self.max_depth {
            self.enqueue_links(job, &page);
        }

        match extract(&page.body, page.content_type.as_deref()) {
            Ok(content) => {
                tracing::debug!("Harvested {} ({} bytes)", job.url, page.body.len());
                Some(PageRecord {
                    url: job.url.to_string(),
                    title: content.title,
                    description: content.description,
                    body: content.body,
                    scraped_at: (self.clock)(),
                    source: job.topic.to_string(),
                })
            }
            Err(e) => {
                tracing::debug!("Skipping content of {}: {}", job.url, e);
                self.tracker.record_parse_skip();
                None
            }
        }
    }

    /// Handles discovered links from a page
    ///
    /// This method:
    /// 1. Records candidates that failed normalization as invalid
    /// 2. Drops blacklisted domains
    /// 3. Drops URLs already visited, invalid or waiting in the queue
    /// 4. Enqueues the rest one level deeper
    fn enqueue_links(&self, job: &Job, page: &FetchedPage) {
        if let Some(content_type) = page.content_type.as_deref() {
            if !is_html_content_type(content_type) {
                return;
            }
        }

        // Redirects may have moved the page; relative links resolve against where it landed
        let base = normalize_url(page.final_url.as_str()).unwrap_or_else(|_| job.url.clone());

        let mut enqueued = 0;
        for candidate in discover(&page.body, &base, &job.topic, self.filter.as_ref()) {
            let url = match candidate.url {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Rejected candidate {}: {}", candidate.href, e);
                    self.tracker.mark_invalid(&candidate.href);
                    continue;
                }
            };

            if is_blacklisted(&url, &self.blacklist) {
                tracing::trace!("Dropping blacklisted candidate {}", url);
                continue;
            }

            if !self.tracker.try_enqueue(&url) {
                self.tracker.record_duplicate();
                continue;
            }

            if self
                .queue
                .push(Job::new(url, Arc::clone(&job.topic), job.depth + 1))
            {
                enqueued += 1;
            }
        }

        tracing::info!(
            "Found {} related URLs for topic '{}' on {}",
            enqueued,
            job.topic,
            job.url
        );
    }
}

/// Runs a complete harvest for a configuration
///
/// Builds a [`Harvester`] and reads targets from the configuration's
/// `[[target]]` entries.
///
/// # Example
///
/// ```no_run
/// use topic_harvester::config::load_config;
/// use topic_harvester::crawler::run_harvest;
/// use tokio_util::sync::CancellationToken;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_harvest(&config, CancellationToken::new()).await?;
/// println!("{} pages", report.records.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: &Config,
    cancel: CancellationToken,
) -> Result<RunReport, HarvestError> {
    let harvester = Harvester::new(config)?;
    harvester.harvest(config, cancel).await
}
