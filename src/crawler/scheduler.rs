//! Shared job queue feeding the worker pool
//!
//! This module handles:
//! - Priority ordering of pending jobs (shallower depth first, FIFO within a depth)
//! - Tracking jobs in flight so workers know when the run is finished
//! - Stopping dispatch on cancellation and counting the jobs left behind
//!
//! A run is complete when the frontier is empty and no job is in flight. A job
//! in flight may still push new jobs, so an empty frontier alone is not enough.

use crate::url::NormalizedUrl;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One URL to fetch, with the topic of the seed it descends from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub url: NormalizedUrl,
    pub topic: Arc<str>,

    /// 0 for seeds, 1 for links found on seeds, and so on
    pub depth: u32,
}

impl Job {
    pub fn new(url: NormalizedUrl, topic: Arc<str>, depth: u32) -> Self {
        Self { url, topic, depth }
    }
}

#[derive(Debug)]
struct QueuedJob {
    job: Job,
    seq: u64,
}

// BinaryHeap is a max-heap: reverse both keys so the shallowest, oldest job pops first
impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .job
            .depth
            .cmp(&self.job.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

#[derive(Debug, Default)]
struct QueueState {
    frontier: BinaryHeap<QueuedJob>,
    in_flight: usize,
    next_seq: u64,
    abandoned: usize,
}

/// Multi-consumer job queue with completion detection
///
/// Workers loop on [`JobQueue::next`] and hold a [`CompletionGuard`] while
/// processing the returned job.
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    cancel: CancellationToken,
}

impl JobQueue {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a job to the frontier
    ///
    /// Returns false, counting the job as abandoned, once the run is cancelled.
    pub fn push(&self, job: Job) -> bool {
        {
            let mut state = self.lock();
            if self.cancel.is_cancelled() {
                state.abandoned += 1;
                return false;
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.frontier.push(QueuedJob { job, seq });
        }

        self.notify.notify_waiters();
        true
    }

    /// Waits for the next job
    ///
    /// # Returns
    ///
    /// * `Some(Job)` - A job to process; the caller must mark it complete
    /// * `None` - The run is finished, or cancelled (pending jobs are dropped)
    pub async fn next(&self) -> Option<Job> {
        loop {
            // Register interest before inspecting state so a wakeup between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();

                if self.cancel.is_cancelled() {
                    let dropped = state.frontier.len();
                    if dropped > 0 {
                        state.frontier.clear();
                        state.abandoned += dropped;
                        tracing::debug!("Cancelled: dropped {} pending jobs", dropped);
                    }
                    return None;
                }

                if let Some(queued) = state.frontier.pop() {
                    state.in_flight += 1;
                    return Some(queued.job);
                }

                if state.in_flight == 0 {
                    drop(state);
                    // Wake idle workers so they observe completion too
                    self.notify.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    /// Marks one job returned by [`JobQueue::next`] as finished
    pub fn complete(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Guard that calls [`JobQueue::complete`] when dropped
    pub fn completion_guard(&self) -> CompletionGuard<'_> {
        CompletionGuard { queue: self }
    }

    pub fn frontier_size(&self) -> usize {
        self.lock().frontier.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Jobs dropped or refused because of cancellation
    pub fn abandoned(&self) -> usize {
        self.lock().abandoned
    }
}

/// Marks a job complete on drop, including on early return or panic
pub struct CompletionGuard<'a> {
    queue: &'a JobQueue,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.queue.complete();
    }
}
