//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `FetchState`: the per-URL retry state machine
//! - `RunTracker`: run-scoped visited and invalid URL sets plus skip counters

mod fetch_state;
mod tracker;

pub use fetch_state::FetchState;
pub use tracker::{Claim, RunTracker, TrackerCounts};
