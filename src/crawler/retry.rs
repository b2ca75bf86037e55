//! Retry controller wrapping single fetch attempts with bounded backoff
//!
//! Each URL walks the `FetchState` machine. Whether a failure is transient or
//! permanent is decided by [`decide`], a pure function over [`FetchError`], so
//! the classification can be tested without a network.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{fetch_url, FetchError, FetchResult, FetchedPage};
use crate::state::FetchState;
use crate::url::NormalizedUrl;
use rand::Rng;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff parameters for one URL's attempt sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Cap for any single delay, including server hints
    pub max_delay: Duration,

    /// Add up to 25% random jitter to computed delays
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    ///
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`. Saturates instead of
    /// overflowing for large attempt numbers.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        if self.jitter {
            self.jittered(delay)
        } else {
            delay
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
        if spread == 0 {
            return delay;
        }
        let extra = rand::rng().random_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure; optionally with a server-provided delay
    Retry { hint: Option<Duration> },
    /// Permanent failure; retrying would only waste budget
    GiveUp,
}

/// Classifies a failed attempt as transient or permanent
///
/// | Failure | Decision |
/// |---------|----------|
/// | Network error, timeout | Retry |
/// | HTTP 5xx | Retry |
/// | HTTP 429 | Retry, honoring `Retry-After` |
/// | Other HTTP 4xx | GiveUp |
/// | Redirect loop / overflow | GiveUp |
pub fn decide(error: &FetchError) -> RetryDecision {
    match error {
        FetchError::Network(_) | FetchError::Timeout => RetryDecision::Retry { hint: None },
        FetchError::Http {
            status_code: 429,
            retry_after,
        } => RetryDecision::Retry { hint: *retry_after },
        FetchError::Http { status_code, .. } if (500..=599).contains(status_code) => {
            RetryDecision::Retry { hint: None }
        }
        FetchError::Http { .. } | FetchError::Redirect(_) => RetryDecision::GiveUp,
    }
}

/// Terminal result of a retry sequence
#[derive(Debug, Clone)]
pub enum RetryResult {
    Success(FetchedPage),
    /// The URL belongs in the invalid set; carries the last failure
    PermanentFailure(FetchError),
    /// The run was cancelled before the sequence finished
    Cancelled,
}

/// Everything the caller learns from one retry sequence
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: RetryResult,

    /// Number of network attempts made
    pub attempts: u32,

    /// Delays slept between attempts, in order
    pub delays: Vec<Duration>,

    /// Terminal state of the machine
    pub state: FetchState,
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, RetryResult::Success(_))
    }
}

/// Fetches `url` with retry and backoff
///
/// Attempts are strictly sequential. Cancellation interrupts a backoff sleep but
/// never an attempt in flight; that attempt is bounded by `timeout`.
pub async fn fetch_with_retry(
    client: &Client,
    url: &NormalizedUrl,
    policy: &RetryPolicy,
    timeout: Duration,
    cancel: &CancellationToken,
) -> RetryOutcome {
    retry_with(url.as_str(), policy, cancel, |_| fetch_url(client, url, timeout)).await
}

/// Drives the retry state machine over an arbitrary attempt function
///
/// `attempt_fn` receives the 1-based attempt number.
pub async fn retry_with<F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchResult>,
{
    let mut state = FetchState::Pending;
    let mut delays = Vec::new();
    let mut attempt = 0;

    if cancel.is_cancelled() {
        advance(label, &mut state, FetchState::Cancelled);
        return finish(RetryResult::Cancelled, attempt, delays, state);
    }

    loop {
        attempt += 1;
        advance(label, &mut state, FetchState::Attempting { attempt });

        let error = match attempt_fn(attempt).await {
            Ok(page) => {
                advance(label, &mut state, FetchState::Success);
                return finish(RetryResult::Success(page), attempt, delays, state);
            }
            Err(error) => error,
        };

        let hint = match decide(&error) {
            RetryDecision::GiveUp => {
                tracing::debug!("Permanent failure for {}: {}", label, error);
                advance(label, &mut state, FetchState::PermanentFailure);
                return finish(RetryResult::PermanentFailure(error), attempt, delays, state);
            }
            RetryDecision::Retry { hint } => hint,
        };

        if attempt >= policy.max_attempts {
            tracing::debug!(
                "Giving up on {} after {} attempts: {}",
                label,
                attempt,
                error
            );
            advance(label, &mut state, FetchState::PermanentFailure);
            return finish(RetryResult::PermanentFailure(error), attempt, delays, state);
        }

        let delay = match hint {
            Some(hint) => hint.min(policy.max_delay),
            None => policy.backoff_delay(attempt),
        };

        tracing::debug!(
            "Transient failure for {} (attempt {}/{}): {}; retrying in {:?}",
            label,
            attempt,
            policy.max_attempts,
            error,
            delay
        );
        advance(label, &mut state, FetchState::Retrying { attempt, delay });
        delays.push(delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                advance(label, &mut state, FetchState::Cancelled);
                return finish(RetryResult::Cancelled, attempt, delays, state);
            }
        }
    }
}

fn advance(label: &str, state: &mut FetchState, next: FetchState) {
    debug_assert!(
        state.can_transition_to(&next),
        "invalid fetch state transition {:?} -> {:?}",
        state,
        next
    );
    tracing::trace!("{}: {} -> {}", label, state, next);
    *state = next;
}

fn finish(
    result: RetryResult,
    attempts: u32,
    delays: Vec<Duration>,
    state: FetchState,
) -> RetryOutcome {
    RetryOutcome {
        result,
        attempts,
        delays,
        state,
    }
}
