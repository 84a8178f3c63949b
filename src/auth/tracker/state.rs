use std::fmt;
use std::sync::Arc;

use crate::auth::error::FailureReason;
use crate::auth::model::User;
use crate::auth::oauth::RedirectMethod;

/// Where the current sign-in attempt stands.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    Idle,
    /// Redirect initiated; waiting for the page to come back.
    RedirectStarted,
    Polling,
    FallingBackToPopup,
    Authenticated {
        user: Arc<User>,
        method: RedirectMethod,
    },
    Failed(FailureReason),
}

impl TrackerState {
    /// `Authenticated` and `Failed` end the attempt; a new one starts from `Idle`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrackerState::Authenticated { .. } | TrackerState::Failed(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::RedirectStarted => "redirect-started",
            TrackerState::Polling => "polling",
            TrackerState::FallingBackToPopup => "falling-back-to-popup",
            TrackerState::Authenticated { .. } => "authenticated",
            TrackerState::Failed(_) => "failed",
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            TrackerState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Authenticated { user, method } => {
                write!(f, "authenticated ({} via {method})", user.uid)
            }
            TrackerState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Why the tracker gave up on the redirect and switched to a popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// The provider kept answering "no result", typically because the
    /// browser partitions the storage the redirect relies on.
    RepeatedEmptyResults,
    AttemptStale,
    PollingExhausted,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FallbackReason::RepeatedEmptyResults => "repeated-empty-results",
            FallbackReason::AttemptStale => "attempt-stale",
            FallbackReason::PollingExhausted => "polling-exhausted",
        })
    }
}
