use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::error::AuthResult;
use crate::auth::persistence::FlagStore;
use crate::platform::clock::elapsed_since;

pub const IN_PROGRESS_KEY: &str = "yamuOAuthInProgress";
pub const TIMESTAMP_KEY: &str = "yamuOAuthTimestamp";
pub const METHOD_KEY: &str = "yamuOAuthMethod";
pub const PRE_ATTEMPT_VIEW_KEY: &str = "yamuPreOAuthSection";

/// Provider entry point used by an attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMethod {
    Redirect,
    Popup,
}

impl RedirectMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RedirectMethod::Redirect => "redirect",
            RedirectMethod::Popup => "popup",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "redirect" => Some(RedirectMethod::Redirect),
            "popup" => Some(RedirectMethod::Popup),
            _ => None,
        }
    }
}

impl fmt::Display for RedirectMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token naming the screen to restore if the attempt fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreAttemptView(String);

impl PreAttemptView {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The sign-in section of the account page.
    pub fn auth() -> Self {
        Self::new("auth")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One in-flight sign-in, persisted so it survives navigating to the
/// provider and back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectAttempt {
    pub in_progress: bool,
    /// Milliseconds since the Unix epoch.
    pub started_at: i64,
    pub method: RedirectMethod,
    pub pre_attempt_view: Option<PreAttemptView>,
}

impl RedirectAttempt {
    pub fn new(started_at: i64, method: RedirectMethod) -> Self {
        Self {
            in_progress: true,
            started_at,
            method,
            pre_attempt_view: None,
        }
    }

    pub fn with_pre_attempt_view(mut self, view: Option<PreAttemptView>) -> Self {
        self.pre_attempt_view = view;
        self
    }

    pub fn age(&self, now_millis: i64) -> Duration {
        elapsed_since(now_millis, self.started_at)
    }

    /// True when the attempt is a redirect whose result should be polled for.
    pub fn awaits_redirect_result(&self) -> bool {
        self.in_progress && self.method == RedirectMethod::Redirect
    }
}

/// Reads and writes [`RedirectAttempt`] as flat keys in a [`FlagStore`].
///
/// Keys are written timestamp first and the in-progress marker last, and
/// cleared in the opposite order, so any reader that sees the marker also
/// sees the timestamp of the same attempt.
#[derive(Clone)]
pub struct RedirectAttemptStore {
    flags: Arc<dyn FlagStore>,
}

impl RedirectAttemptStore {
    pub fn new(flags: Arc<dyn FlagStore>) -> Self {
        Self { flags }
    }

    /// Returns the persisted attempt, or `None` if it is absent, not in
    /// progress, or only partially written.
    pub fn load(&self) -> AuthResult<Option<RedirectAttempt>> {
        if self.flags.get(IN_PROGRESS_KEY)?.as_deref() != Some("true") {
            return Ok(None);
        }
        let Some(started_at) = self
            .flags
            .get(TIMESTAMP_KEY)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
        else {
            return Ok(None);
        };
        // Pages shipped before the method key existed only ever redirected.
        let method = self
            .flags
            .get(METHOD_KEY)?
            .and_then(|raw| RedirectMethod::parse(raw.trim()))
            .unwrap_or(RedirectMethod::Redirect);
        let pre_attempt_view = self.flags.get(PRE_ATTEMPT_VIEW_KEY)?.map(PreAttemptView);

        Ok(Some(RedirectAttempt {
            in_progress: true,
            started_at,
            method,
            pre_attempt_view,
        }))
    }

    /// Like [`load`](Self::load) but storage failures read as "no attempt".
    pub fn load_or_none(&self) -> Option<RedirectAttempt> {
        self.load().unwrap_or_else(|err| {
            log::warn!("failed to read redirect attempt flags: {err}");
            None
        })
    }

    pub fn is_in_progress(&self) -> bool {
        self.load_or_none().is_some()
    }

    /// Replaces any existing attempt with `attempt`.
    pub fn begin(&self, attempt: &RedirectAttempt) -> AuthResult<()> {
        self.clear()?;
        self.flags
            .set(TIMESTAMP_KEY, &attempt.started_at.to_string())?;
        self.flags.set(METHOD_KEY, attempt.method.as_str())?;
        if let Some(view) = &attempt.pre_attempt_view {
            self.flags.set(PRE_ATTEMPT_VIEW_KEY, view.as_str())?;
        }
        if attempt.in_progress {
            self.flags.set(IN_PROGRESS_KEY, "true")?;
        }
        Ok(())
    }

    /// Removes every flag of the current attempt.
    pub fn clear(&self) -> AuthResult<()> {
        self.flags.remove(IN_PROGRESS_KEY)?;
        self.flags.remove(TIMESTAMP_KEY)?;
        self.flags.remove(METHOD_KEY)?;
        self.flags.remove(PRE_ATTEMPT_VIEW_KEY)
    }

    /// The view recorded before the attempt, even after the in-progress
    /// marker has been cleared.
    pub fn pre_attempt_view(&self) -> Option<PreAttemptView> {
        self.flags
            .get(PRE_ATTEMPT_VIEW_KEY)
            .ok()
            .flatten()
            .map(PreAttemptView)
    }
}
