//! Tuning for redirect completion.
//!
//! One parameterised state machine serves both environments; only the values
//! below differ between redirect-prone (mobile) and desktop browsers.

use std::time::Duration;

use serde::Deserialize;

use crate::auth::error::{AuthError, AuthResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_PER_CALL_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_NULL_RESULT_THRESHOLD: u32 = 3;
pub const MOBILE_STALE_AFTER: Duration = Duration::from_secs(3 * 60);
pub const DESKTOP_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
pub const MOBILE_MAX_POLLING: Duration = Duration::from_secs(30);
pub const DESKTOP_MAX_POLLING: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 50;
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_READY_CHECK_INTERVAL: Duration = Duration::from_millis(100);
pub const MOBILE_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_POPUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Whether the environment tends to lose redirect results. Decides
    /// between popup fallback and a timeout failure when an attempt stalls.
    pub redirect_prone: bool,
    /// Fixed delay between polls.
    pub poll_interval: Duration,
    /// Upper bound on a single "get redirect result" call.
    pub per_call_timeout: Duration,
    /// Consecutive empty results that trigger the popup fallback.
    pub null_result_threshold: u32,
    /// Age after which an attempt is abandoned.
    pub stale_after: Duration,
    /// Ceiling on a single polling loop, independent of attempt age.
    pub max_polling: Duration,
    pub max_poll_attempts: u32,
    pub ready_timeout: Duration,
    pub ready_check_interval: Duration,
    /// Pause after the provider reports ready, before the first poll.
    pub settle_delay: Duration,
    /// Upper bound on the fallback popup, which waits on the user.
    pub popup_timeout: Duration,
}

impl TrackerConfig {
    /// Defaults for mobile browsers.
    pub fn mobile() -> Self {
        Self {
            redirect_prone: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            per_call_timeout: DEFAULT_PER_CALL_TIMEOUT,
            null_result_threshold: DEFAULT_NULL_RESULT_THRESHOLD,
            stale_after: MOBILE_STALE_AFTER,
            max_polling: MOBILE_MAX_POLLING,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            ready_check_interval: DEFAULT_READY_CHECK_INTERVAL,
            settle_delay: MOBILE_SETTLE_DELAY,
            popup_timeout: DEFAULT_POPUP_TIMEOUT,
        }
    }

    /// Defaults for desktop browsers.
    pub fn desktop() -> Self {
        Self {
            redirect_prone: false,
            stale_after: DESKTOP_STALE_AFTER,
            max_polling: DESKTOP_MAX_POLLING,
            settle_delay: Duration::ZERO,
            ..Self::mobile()
        }
    }

    pub fn for_environment(redirect_prone: bool) -> Self {
        if redirect_prone {
            Self::mobile()
        } else {
            Self::desktop()
        }
    }

    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    pub fn with_per_call_timeout(mut self, value: Duration) -> Self {
        self.per_call_timeout = value;
        self
    }

    pub fn with_null_result_threshold(mut self, value: u32) -> Self {
        self.null_result_threshold = value;
        self
    }

    pub fn with_stale_after(mut self, value: Duration) -> Self {
        self.stale_after = value;
        self
    }

    pub fn with_max_polling(mut self, value: Duration, max_attempts: u32) -> Self {
        self.max_polling = value;
        self.max_poll_attempts = max_attempts;
        self
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.poll_interval.is_zero() {
            return Err(invalid("poll_interval must be greater than zero"));
        }
        if self.per_call_timeout.is_zero() {
            return Err(invalid("per_call_timeout must be greater than zero"));
        }
        if self.null_result_threshold == 0 {
            return Err(invalid("null_result_threshold must be at least 1"));
        }
        if self.max_poll_attempts == 0 || self.max_polling.is_zero() {
            return Err(invalid("polling ceiling must allow at least one poll"));
        }
        if self.stale_after.is_zero() {
            return Err(invalid("stale_after must be greater than zero"));
        }
        if self.ready_check_interval.is_zero() {
            return Err(invalid("ready_check_interval must be greater than zero"));
        }
        if self.popup_timeout.is_zero() {
            return Err(invalid("popup_timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Builds the environment preset and overlays the millisecond values
    /// present in `json`, e.g. `{"pollIntervalMillis": 1500}`.
    pub fn from_json(json: &str, redirect_prone: bool) -> AuthResult<Self> {
        let update: TrackerConfigUpdate = serde_json::from_str(json)
            .map_err(|err| invalid(&format!("unreadable tracker config: {err}")))?;
        let config = update.apply(Self::for_environment(redirect_prone));
        config.validate()?;
        Ok(config)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::mobile()
    }
}

/// Partial override, typically shipped as JSON alongside the page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrackerConfigUpdate {
    pub poll_interval_millis: Option<u64>,
    pub per_call_timeout_millis: Option<u64>,
    pub null_result_threshold: Option<u32>,
    pub stale_after_millis: Option<u64>,
    pub max_polling_millis: Option<u64>,
    pub max_poll_attempts: Option<u32>,
    pub ready_timeout_millis: Option<u64>,
    pub settle_delay_millis: Option<u64>,
    pub popup_timeout_millis: Option<u64>,
}

impl TrackerConfigUpdate {
    pub fn apply(&self, mut config: TrackerConfig) -> TrackerConfig {
        let millis = Duration::from_millis;
        if let Some(value) = self.poll_interval_millis {
            config.poll_interval = millis(value);
        }
        if let Some(value) = self.per_call_timeout_millis {
            config.per_call_timeout = millis(value);
        }
        if let Some(value) = self.null_result_threshold {
            config.null_result_threshold = value;
        }
        if let Some(value) = self.stale_after_millis {
            config.stale_after = millis(value);
        }
        if let Some(value) = self.max_polling_millis {
            config.max_polling = millis(value);
        }
        if let Some(value) = self.max_poll_attempts {
            config.max_poll_attempts = value;
        }
        if let Some(value) = self.ready_timeout_millis {
            config.ready_timeout = millis(value);
        }
        if let Some(value) = self.settle_delay_millis {
            config.settle_delay = millis(value);
        }
        if let Some(value) = self.popup_timeout_millis {
            config.popup_timeout = millis(value);
        }
        config
    }
}

fn invalid(message: &str) -> AuthError {
    AuthError::InvalidConfig(message.to_string())
}
