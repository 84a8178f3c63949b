//! Completion tracking for OAuth redirect sign-in.
//!
//! Mobile browsers frequently come back from the provider without a usable
//! redirect result. [`RedirectCompletionTracker`] persists the attempt before
//! navigating away, polls for the result after the page reloads, and switches
//! to a popup once the redirect is clearly not going to complete. Every wait
//! it performs is bounded, and the persisted attempt is the only record of
//! whether a sign-in is still in flight.

mod config;
mod state;

pub use config::{
    TrackerConfig, TrackerConfigUpdate, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_NULL_RESULT_THRESHOLD,
    DEFAULT_PER_CALL_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_POPUP_TIMEOUT, DESKTOP_STALE_AFTER,
    MOBILE_STALE_AFTER,
};
pub use state::{FallbackReason, TrackerState};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::auth::error::{AuthError, AuthResult, FailureReason};
use crate::auth::logger::LOGGER;
use crate::auth::messages::{failure_message, user_message};
use crate::auth::model::{User, UserCredential};
use crate::auth::oauth::{
    AuthProvider, PreAttemptView, ProviderConfig, RedirectAttempt, RedirectAttemptStore,
    RedirectMethod,
};
use crate::auth::persistence::FlagStore;
use crate::auth::presenter::Presenter;
use crate::logger::LogArgument;
use crate::platform::clock::{elapsed_since, Clock, SystemClock};
use crate::platform::environment::DeviceProfile;
use crate::platform::runtime::{self, TimeoutError};

/// Drives one sign-in attempt from "redirect started" to a terminal state.
pub struct RedirectCompletionTracker {
    provider: Arc<dyn AuthProvider>,
    attempts: RedirectAttemptStore,
    presenter: Arc<dyn Presenter>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    provider_config: ProviderConfig,
    state: Mutex<TrackerState>,
    last_method: Mutex<Option<RedirectMethod>>,
    polling: AtomicBool,
    /// Session id of the direct popup currently open, if any.
    open_popup: Mutex<Option<u64>>,
    popup_sessions: AtomicU64,
}

pub struct TrackerBuilder {
    provider: Arc<dyn AuthProvider>,
    flags: Arc<dyn FlagStore>,
    presenter: Arc<dyn Presenter>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<TrackerConfig>,
    provider_config: ProviderConfig,
}

impl TrackerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the environment preset picked from the detected device.
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn provider_config(mut self, provider_config: ProviderConfig) -> Self {
        self.provider_config = provider_config;
        self
    }

    pub fn build(self) -> AuthResult<RedirectCompletionTracker> {
        let config = match self.config {
            Some(config) => config,
            None => TrackerConfig::for_environment(
                DeviceProfile::detect()
                    .map(|profile| profile.is_redirect_prone())
                    .unwrap_or(false),
            ),
        };
        config.validate()?;

        let attempts = RedirectAttemptStore::new(self.flags);
        // A page that loads while an attempt is persisted resumes from it.
        let (state, last_method) = match attempts.load_or_none() {
            Some(attempt) if attempt.awaits_redirect_result() => {
                (TrackerState::RedirectStarted, Some(attempt.method))
            }
            _ => (TrackerState::Idle, None),
        };

        Ok(RedirectCompletionTracker {
            provider: self.provider,
            attempts,
            presenter: self.presenter,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config,
            provider_config: self.provider_config,
            state: Mutex::new(state),
            last_method: Mutex::new(last_method),
            polling: AtomicBool::new(false),
            open_popup: Mutex::new(None),
            popup_sessions: AtomicU64::new(0),
        })
    }
}

impl RedirectCompletionTracker {
    pub fn builder(
        provider: Arc<dyn AuthProvider>,
        flags: Arc<dyn FlagStore>,
        presenter: Arc<dyn Presenter>,
    ) -> TrackerBuilder {
        TrackerBuilder {
            provider,
            flags,
            presenter,
            clock: None,
            config: None,
            provider_config: ProviderConfig::google(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state.lock().unwrap().clone()
    }

    /// How the most recent attempt tried to sign in.
    pub fn last_method(&self) -> Option<RedirectMethod> {
        *self.last_method.lock().unwrap()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn provider_config(&self) -> &ProviderConfig {
        &self.provider_config
    }

    /// Whether a polling loop is currently running.
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    /// Whether a popup started by [`sign_in_with_popup`](Self::sign_in_with_popup)
    /// is still open.
    pub fn is_popup_open(&self) -> bool {
        self.open_popup.lock().unwrap().is_some()
    }

    pub fn pending_attempt(&self) -> Option<RedirectAttempt> {
        self.attempts.load_or_none()
    }

    /// The view to restore once the attempt resolves.
    pub fn pre_attempt_view(&self) -> Option<PreAttemptView> {
        self.attempts.pre_attempt_view()
    }

    /// Persists a new attempt and navigates to the provider.
    ///
    /// Any previous attempt is replaced. In a browser the navigation unloads
    /// the page, so on success this future usually never completes.
    pub async fn start_redirect_sign_in(&self, view: Option<PreAttemptView>) -> AuthResult<()> {
        let attempt = RedirectAttempt::new(self.clock.now_millis(), RedirectMethod::Redirect)
            .with_pre_attempt_view(view);
        if let Err(err) = self.attempts.begin(&attempt) {
            LOGGER.error(format!("could not persist redirect attempt: {err}"));
            self.fail(FailureReason::Provider(err.clone()));
            return Err(err);
        }

        *self.last_method.lock().unwrap() = Some(RedirectMethod::Redirect);
        self.set_state(TrackerState::RedirectStarted);
        self.presenter.show_completing_sign_in();
        LOGGER.info("starting redirect sign-in");

        if let Err(err) = self.provider.start_redirect_sign_in(&self.provider_config).await {
            LOGGER.warn(format!("redirect sign-in could not start: {err}"));
            self.clear_attempt();
            self.fail(FailureReason::Provider(err.clone()));
            return Err(err);
        }
        Ok(())
    }

    /// Signs in through a popup without persisting an attempt.
    ///
    /// Used where popups are reliable. The tracker stays `Idle` while the
    /// popup is open and ends in `Authenticated` or `Failed`. A popup that
    /// finishes after [`cancel`](Self::cancel) or [`reset`](Self::reset)
    /// leaves the state alone and reports `auth/cancelled-popup-request`.
    pub async fn sign_in_with_popup(&self) -> AuthResult<Arc<User>> {
        let session = {
            let mut state = self.state.lock().unwrap();
            self.clear_attempt();
            *state = TrackerState::Idle;
            let session = self.popup_sessions.fetch_add(1, Ordering::SeqCst) + 1;
            *self.open_popup.lock().unwrap() = Some(session);
            session
        };
        *self.last_method.lock().unwrap() = Some(RedirectMethod::Popup);
        self.presenter.show_completing_sign_in();
        LOGGER.info("starting popup sign-in");

        let popup = self.provider.start_popup_sign_in(&self.provider_config);
        let timer = self.clock.sleep(self.config.popup_timeout);
        let outcome = runtime::race(popup, timer).await;

        let (next, result) = match outcome {
            Ok(Ok(credential)) if credential.user.is_valid() => {
                let user = credential.user;
                let next = TrackerState::Authenticated {
                    user: user.clone(),
                    method: RedirectMethod::Popup,
                };
                (next, Ok(user))
            }
            Ok(Ok(_)) => {
                let err =
                    AuthError::provider("auth/internal-error", "Sign-in window returned no user.");
                let reason = FailureReason::Provider(err.clone());
                (TrackerState::Failed(reason), Err(err))
            }
            Ok(Err(err)) => {
                LOGGER.warn(format!("popup sign-in failed: {err}"));
                let reason = FailureReason::from_popup_error(err.clone());
                (TrackerState::Failed(reason), Err(err))
            }
            Err(TimeoutError) => (
                TrackerState::Failed(FailureReason::Timeout),
                Err(AuthError::provider("auth/timeout", "Sign-in window timed out.")),
            ),
        };

        if !self.close_popup(session, next.clone()) {
            LOGGER.debug("popup finished after the sign-in was abandoned");
            return Err(AuthError::provider(
                "auth/cancelled-popup-request",
                "Sign-in was abandoned before the window closed.",
            ));
        }
        match &next {
            TrackerState::Authenticated { user, method } => self.announce(user, *method),
            TrackerState::Failed(reason) => self.report_failure(reason),
            _ => {}
        }
        result
    }

    /// Looks for the result of a persisted redirect attempt, polling until
    /// the attempt resolves, goes stale, or falls back to a popup.
    ///
    /// Safe to call from any number of triggers: while a loop is running
    /// further calls return the current state without doing anything.
    pub async fn check_redirect_result(&self) -> AuthResult<TrackerState> {
        let Some(_guard) = PollingGuard::acquire(&self.polling) else {
            LOGGER.debug("redirect check already running");
            return Ok(self.state());
        };

        let attempt = match self.attempts.load_or_none() {
            Some(attempt) => attempt,
            None => {
                self.transition(
                    |state| matches!(state, TrackerState::RedirectStarted),
                    TrackerState::Idle,
                );
                return Ok(self.state());
            }
        };
        if !attempt.awaits_redirect_result() {
            // The page reloaded while the fallback popup was open.
            LOGGER.info("discarding interrupted popup attempt");
            self.clear_attempt();
            self.transition(|state| !state.is_terminal(), TrackerState::Idle);
            return Ok(self.state());
        }

        *self.last_method.lock().unwrap() = Some(attempt.method);
        self.set_state(TrackerState::RedirectStarted);
        self.presenter.show_completing_sign_in();

        if let Err(err) = self.wait_for_provider_ready().await {
            LOGGER.error(format!("auth provider unavailable: {err}"));
            self.presenter
                .show_error(&user_message(&err, self.config.redirect_prone));
            return Err(err);
        }

        let moved = self.transition(
            |state| matches!(state, TrackerState::RedirectStarted),
            TrackerState::Polling,
        );
        if !moved {
            return Ok(self.state());
        }
        LOGGER.info_with([
            LogArgument::from("polling for redirect result"),
            LogArgument::field(
                "attempt_age_ms",
                attempt.age(self.clock.now_millis()).as_millis() as u64,
            ),
            LogArgument::field("redirect_prone", self.config.redirect_prone),
        ]);

        self.poll_until_resolved(attempt).await;
        Ok(self.state())
    }

    /// Resolves the attempt from an auth state notification.
    ///
    /// Returns `true` if this call moved the tracker to `Authenticated`.
    /// Notifications that arrive after the attempt was cleared are ignored.
    pub fn observe_authenticated(&self, user: Arc<User>) -> bool {
        if !user.is_valid() {
            LOGGER.warn("ignoring auth state change without a user id");
            return false;
        }
        self.resolve(user)
    }

    /// Abandons the attempt in flight, including an open popup.
    ///
    /// Returns `false` when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            let mut open_popup = self.open_popup.lock().unwrap();
            let has_attempt = self.attempts.is_in_progress();
            if state.is_terminal()
                || (*state == TrackerState::Idle && !has_attempt && open_popup.is_none())
            {
                return false;
            }
            *open_popup = None;
            self.clear_attempt();
            *state = TrackerState::Failed(FailureReason::Cancelled);
        }
        LOGGER.info("sign-in cancelled by user");
        self.report_failure(&FailureReason::Cancelled);
        true
    }

    /// Forgets the current attempt and returns to `Idle`, e.g. after sign-out
    /// or before a retry. An open popup no longer counts once it returns.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        self.open_popup.lock().unwrap().take();
        self.clear_attempt();
        *state = TrackerState::Idle;
    }

    async fn wait_for_provider_ready(&self) -> AuthResult<()> {
        let started = self.clock.now_millis();
        loop {
            let ready = runtime::race(
                self.provider.is_ready(),
                self.clock.sleep(self.config.ready_check_interval),
            )
            .await
            .unwrap_or(false);
            if ready {
                break;
            }
            if elapsed_since(self.clock.now_millis(), started) >= self.config.ready_timeout {
                return Err(AuthError::ProviderNotReady(self.config.ready_timeout));
            }
            self.clock.sleep(self.config.ready_check_interval).await;
        }

        if !self.config.settle_delay.is_zero() {
            self.clock.sleep(self.config.settle_delay).await;
        }
        Ok(())
    }

    async fn poll_until_resolved(&self, mut attempt: RedirectAttempt) {
        let loop_started = self.clock.now_millis();
        let mut empty_results = 0u32;
        let mut polls = 0u32;

        loop {
            if !self.is_in(TrackerState::Polling) {
                return;
            }
            polls += 1;
            let credential = self.poll_once().await;
            if !self.is_in(TrackerState::Polling) {
                return;
            }

            if let Some(credential) = credential {
                if !self.resolve(credential.user) {
                    self.transition(|state| *state == TrackerState::Polling, TrackerState::Idle);
                }
                return;
            }

            match self.attempts.load() {
                Ok(Some(current)) if current.awaits_redirect_result() => attempt = current,
                Ok(_) => {
                    LOGGER.debug("redirect attempt cleared while polling");
                    self.transition(|state| *state == TrackerState::Polling, TrackerState::Idle);
                    return;
                }
                // Keep going with what was read when the loop started.
                Err(err) => LOGGER.warn(format!("could not re-read redirect attempt: {err}")),
            }

            empty_results += 1;
            if empty_results >= self.config.null_result_threshold {
                LOGGER.warn(format!(
                    "no redirect result after {empty_results} checks, switching to popup"
                ));
                self.fall_back_to_popup(FallbackReason::RepeatedEmptyResults)
                    .await;
                return;
            }

            let now = self.clock.now_millis();
            if attempt.age(now) > self.config.stale_after {
                self.give_up(FallbackReason::AttemptStale).await;
                return;
            }
            if polls >= self.config.max_poll_attempts
                || elapsed_since(now, loop_started) >= self.config.max_polling
            {
                self.give_up(FallbackReason::PollingExhausted).await;
                return;
            }

            self.clock.sleep(self.config.poll_interval).await;
        }
    }

    /// One bounded "get redirect result" call. Errors and timeouts read as
    /// an empty result.
    async fn poll_once(&self) -> Option<UserCredential> {
        let call = self.provider.get_pending_redirect_result();
        let timer = self.clock.sleep(self.config.per_call_timeout);
        match runtime::race(call, timer).await {
            Ok(Ok(Some(credential))) if credential.user.is_valid() => Some(credential),
            Ok(Ok(Some(_))) => {
                LOGGER.warn("redirect result carried no user");
                None
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                LOGGER.warn(format!("redirect result lookup failed: {err}"));
                None
            }
            Err(TimeoutError) => {
                LOGGER.warn(format!(
                    "redirect result lookup timed out after {:?}",
                    self.config.per_call_timeout
                ));
                None
            }
        }
    }

    /// Stale or exhausted attempts fall back to a popup where redirects are
    /// unreliable and fail with a timeout elsewhere.
    async fn give_up(&self, reason: FallbackReason) {
        if self.config.redirect_prone {
            LOGGER.warn(format!("redirect attempt abandoned ({reason}), switching to popup"));
            self.fall_back_to_popup(reason).await;
            return;
        }

        let mut state = self.state.lock().unwrap();
        if *state != TrackerState::Polling {
            return;
        }
        self.clear_attempt();
        *state = TrackerState::Failed(FailureReason::Timeout);
        drop(state);
        LOGGER.warn(format!("redirect attempt abandoned ({reason})"));
        self.report_failure(&FailureReason::Timeout);
    }

    async fn fall_back_to_popup(&self, reason: FallbackReason) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != TrackerState::Polling {
                return;
            }
            let view = self.attempts.pre_attempt_view();
            let attempt = RedirectAttempt::new(self.clock.now_millis(), RedirectMethod::Popup)
                .with_pre_attempt_view(view);
            if let Err(err) = self.attempts.begin(&attempt) {
                // The popup still runs; its outcome is resolved in memory.
                LOGGER.warn(format!("could not persist popup attempt: {err}"));
            }
            *state = TrackerState::FallingBackToPopup;
        }
        *self.last_method.lock().unwrap() = Some(RedirectMethod::Popup);
        self.presenter.show_fallback_notice(reason);

        let popup = self.provider.start_popup_sign_in(&self.provider_config);
        let timer = self.clock.sleep(self.config.popup_timeout);
        let outcome = runtime::race(popup, timer).await;

        if !self.is_in(TrackerState::FallingBackToPopup) {
            return;
        }
        match outcome {
            Ok(Ok(credential)) if credential.user.is_valid() => {
                if !self.resolve_popup(credential.user) {
                    LOGGER.debug("popup result arrived after the attempt was resolved");
                }
            }
            Ok(Ok(_)) => self.fail_popup(FailureReason::Provider(AuthError::provider(
                "auth/internal-error",
                "Sign-in window returned no user.",
            ))),
            Ok(Err(err)) => {
                LOGGER.warn(format!("popup sign-in failed: {err}"));
                self.fail_popup(FailureReason::from_popup_error(err));
            }
            Err(TimeoutError) => self.fail_popup(FailureReason::Timeout),
        }
    }

    fn resolve_popup(&self, user: Arc<User>) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != TrackerState::FallingBackToPopup {
            return false;
        }
        self.clear_attempt();
        *state = TrackerState::Authenticated {
            user: user.clone(),
            method: RedirectMethod::Popup,
        };
        drop(state);
        self.announce(&user, RedirectMethod::Popup);
        true
    }

    fn fail_popup(&self, reason: FailureReason) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != TrackerState::FallingBackToPopup {
                return;
            }
            self.clear_attempt();
            *state = TrackerState::Failed(reason.clone());
        }
        self.report_failure(&reason);
    }

    /// Moves to `Authenticated` if an attempt is still persisted. Whichever
    /// path clears the attempt first wins; the others become no-ops.
    ///
    /// When the flags cannot be read, an attempt the tracker is actively
    /// completing still resolves.
    fn resolve(&self, user: Arc<User>) -> bool {
        let method = {
            let mut state = self.state.lock().unwrap();
            if state.is_terminal() {
                return false;
            }
            let method = match self.attempts.load() {
                Ok(Some(attempt)) => attempt.method,
                Ok(None) => return false,
                Err(err) => {
                    let method = match *state {
                        TrackerState::RedirectStarted | TrackerState::Polling => {
                            RedirectMethod::Redirect
                        }
                        TrackerState::FallingBackToPopup => RedirectMethod::Popup,
                        _ => return false,
                    };
                    LOGGER.warn(format!(
                        "could not read redirect attempt, resolving from {}: {err}",
                        state.name()
                    ));
                    method
                }
            };
            self.clear_attempt();
            *state = TrackerState::Authenticated {
                user: user.clone(),
                method,
            };
            method
        };
        *self.last_method.lock().unwrap() = Some(method);
        self.announce(&user, method);
        true
    }

    fn announce(&self, user: &User, method: RedirectMethod) {
        LOGGER.info_with([
            LogArgument::from("sign-in completed"),
            LogArgument::field("method", method.as_str()),
            LogArgument::field("uid", user.uid.as_str()),
        ]);
        self.presenter.show_authenticated(user);
    }

    fn fail(&self, reason: FailureReason) {
        self.set_state(TrackerState::Failed(reason.clone()));
        self.report_failure(&reason);
    }

    /// Shows the terminal message. On mobile, anything but an explicit
    /// cancel also points the user at email sign-in.
    fn report_failure(&self, reason: &FailureReason) {
        self.presenter
            .show_error(&failure_message(reason, self.config.redirect_prone));
        if self.config.redirect_prone && *reason != FailureReason::Cancelled {
            self.presenter.suggest_email_sign_in();
        }
    }

    /// Ends the direct popup `session` in `next`, unless it was abandoned.
    fn close_popup(&self, session: u64, next: TrackerState) -> bool {
        let mut state = self.state.lock().unwrap();
        let mut open_popup = self.open_popup.lock().unwrap();
        if *open_popup != Some(session) {
            return false;
        }
        *open_popup = None;
        *state = next;
        true
    }

    fn clear_attempt(&self) {
        if let Err(err) = self.attempts.clear() {
            LOGGER.warn(format!("could not clear redirect attempt: {err}"));
        }
    }

    fn set_state(&self, next: TrackerState) {
        *self.state.lock().unwrap() = next;
    }

    fn is_in(&self, expected: TrackerState) -> bool {
        *self.state.lock().unwrap() == expected
    }

    fn transition(&self, from: impl Fn(&TrackerState) -> bool, to: TrackerState) -> bool {
        let mut state = self.state.lock().unwrap();
        if from(&state) {
            *state = to;
            true
        } else {
            false
        }
    }
}

/// Marks a polling loop as running until dropped.
struct PollingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PollingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
