//! Per-URL fetch state machine
//!
//! `Pending -> Attempting -> {Success | Retrying | PermanentFailure}`, with
//! `Retrying -> Attempting` for the next attempt. A run cancellation can end
//! the sequence from `Pending` or `Retrying`.

use std::fmt;
use std::time::Duration;

/// Represents where a single URL's fetch sequence currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    // ===== Active States =====
    /// Not attempted yet
    Pending,

    /// An attempt (1-based) is on the wire
    Attempting { attempt: u32 },

    /// The given attempt failed transiently; waiting `delay` before the next one
    Retrying { attempt: u32, delay: Duration },

    // ===== Terminal States =====
    /// A response was received and accepted
    Success,

    /// The URL will not resolve on retry; it belongs in the invalid set
    PermanentFailure,

    /// The run was cancelled before the sequence finished
    Cancelled,
}

impl FetchState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::PermanentFailure | Self::Cancelled
        )
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: &FetchState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Attempting { attempt }) => *attempt == 1,
            (Self::Pending, Self::Cancelled) => true,
            (Self::Attempting { .. }, Self::Success | Self::PermanentFailure) => true,
            (Self::Attempting { attempt: a }, Self::Retrying { attempt: b, .. }) => a == b,
            (Self::Retrying { attempt: a, .. }, Self::Attempting { attempt: b }) => *b == a + 1,
            (Self::Retrying { .. }, Self::Cancelled) => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attempting { .. } => "attempting",
            Self::Retrying { .. } => "retrying",
            Self::Success => "success",
            Self::PermanentFailure => "permanent_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempting { attempt } => write!(f, "attempting (#{})", attempt),
            Self::Retrying { attempt, delay } => {
                write!(f, "retrying after #{} in {:?}", attempt, delay)
            }
            other => f.write_str(other.label()),
        }
    }
}
