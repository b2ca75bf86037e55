//! Run-scoped dedup and invalid-URL tracking
//!
//! One `RunTracker` is created per run and shared by all workers. Every read
//! and write of the visited, queued and invalid sets goes through a single
//! mutex, so "check unvisited, then mark visited" is one atomic step.

use crate::url::NormalizedUrl;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of trying to claim a URL for fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns this URL and must fetch it
    Claimed,
    /// Another job already attempted this URL in the current run
    AlreadyVisited,
    /// The URL is known to be permanently unfetchable
    KnownInvalid,
}

#[derive(Debug, Default)]
struct TrackerState {
    visited: HashSet<String>,
    queued: HashSet<String>,
    invalid: HashSet<String>,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerCounts {
    pub visited: usize,
    pub invalid: usize,
    pub parse_skipped: usize,
    pub duplicates: usize,
    pub abandoned: usize,
}

/// Visited set, invalid URL set and per-run skip counters
#[derive(Debug, Default)]
pub struct RunTracker {
    state: Mutex<TrackerState>,
    parse_skipped: AtomicUsize,
    duplicates: AtomicUsize,
    abandoned: AtomicUsize,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // The sets stay consistent even if a holder panicked: every mutation
        // is a single insert.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically checks and marks a URL as visited
    ///
    /// Exactly one caller receives `Claim::Claimed` for a given URL per run.
    pub fn claim(&self, url: &NormalizedUrl) -> Claim {
        let mut state = self.lock();

        if state.invalid.contains(url.as_str()) {
            return Claim::KnownInvalid;
        }

        if state.visited.insert(url.as_str().to_string()) {
            Claim::Claimed
        } else {
            Claim::AlreadyVisited
        }
    }

    /// Reserves a frontier slot for a URL
    ///
    /// Returns false if the URL was already queued, attempted or found invalid
    /// in this run. At most one job per URL ever enters the queue.
    pub fn try_enqueue(&self, url: &NormalizedUrl) -> bool {
        let mut state = self.lock();
        let key = url.as_str();

        if state.visited.contains(key) || state.invalid.contains(key) {
            return false;
        }
        state.queued.insert(key.to_string())
    }

    /// Records a URL as permanently unfetchable
    ///
    /// Accepts raw strings too, so candidates that fail normalization are
    /// remembered under their original spelling. Returns true on first insert.
    pub fn mark_invalid(&self, url: &str) -> bool {
        self.lock().invalid.insert(url.to_string())
    }

    pub fn record_parse_skip(&self) {
        self.parse_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: usize) {
        self.abandoned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn counts(&self) -> TrackerCounts {
        let (visited, invalid) = {
            let state = self.lock();
            (state.visited.len(), state.invalid.len())
        };

        TrackerCounts {
            visited,
            invalid,
            parse_skipped: self.parse_skipped.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}
