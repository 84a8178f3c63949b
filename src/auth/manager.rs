use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::auth::email::validate_email_sign_in;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::logger::LOGGER;
use crate::auth::messages::{user_message, SIGN_OUT_FAILED};
use crate::auth::model::{Unsubscribe, User};
use crate::auth::oauth::{AuthProvider, PreAttemptView, ProviderConfig};
use crate::auth::persistence::FlagStore;
use crate::auth::presenter::Presenter;
use crate::auth::tracker::{RedirectCompletionTracker, TrackerConfig, TrackerState};
use crate::platform::clock::{Clock, SystemClock};
use crate::platform::runtime;

/// Page lifecycle signals that may mean the browser just came back from the
/// provider without reloading the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The document became visible again.
    Visible,
    Focus,
    /// The page was restored from the back/forward cache.
    Resume,
}

impl LifecycleEvent {
    /// How long to let the page settle before checking for a result.
    pub fn settle_delay(self) -> Duration {
        match self {
            LifecycleEvent::Visible => Duration::from_millis(1_000),
            LifecycleEvent::Focus => Duration::from_millis(500),
            LifecycleEvent::Resume => Duration::ZERO,
        }
    }
}

/// Account sign-in for a single page.
///
/// Wires the auth provider's notifications and the page lifecycle into a
/// [`RedirectCompletionTracker`], and keeps track of the signed-in user.
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct AccountAuth {
    inner: Arc<AccountAuthInner>,
}

struct AccountAuthInner {
    tracker: RedirectCompletionTracker,
    provider: Arc<dyn AuthProvider>,
    presenter: Arc<dyn Presenter>,
    clock: Arc<dyn Clock>,
    current_user: Mutex<Option<Arc<User>>>,
    view_to_restore: Mutex<Option<PreAttemptView>>,
    subscription: Mutex<Option<Unsubscribe>>,
    email_sign_in: AtomicBool,
}

pub struct AccountAuthBuilder {
    provider: Arc<dyn AuthProvider>,
    flags: Arc<dyn FlagStore>,
    presenter: Arc<dyn Presenter>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<TrackerConfig>,
    provider_config: Option<ProviderConfig>,
}

impl AccountAuthBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn provider_config(mut self, provider_config: ProviderConfig) -> Self {
        self.provider_config = Some(provider_config);
        self
    }

    pub fn build(self) -> AuthResult<AccountAuth> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let mut tracker = RedirectCompletionTracker::builder(
            self.provider.clone(),
            self.flags,
            self.presenter.clone(),
        )
        .clock(clock.clone());
        if let Some(config) = self.config {
            tracker = tracker.config(config);
        }
        if let Some(provider_config) = self.provider_config {
            tracker = tracker.provider_config(provider_config);
        }

        Ok(AccountAuth {
            inner: Arc::new(AccountAuthInner {
                tracker: tracker.build()?,
                provider: self.provider,
                presenter: self.presenter,
                clock,
                current_user: Mutex::new(None),
                view_to_restore: Mutex::new(None),
                subscription: Mutex::new(None),
                email_sign_in: AtomicBool::new(false),
            }),
        })
    }
}

impl AccountAuth {
    pub fn builder(
        provider: Arc<dyn AuthProvider>,
        flags: Arc<dyn FlagStore>,
        presenter: Arc<dyn Presenter>,
    ) -> AccountAuthBuilder {
        AccountAuthBuilder {
            provider,
            flags,
            presenter,
            clock: None,
            config: None,
            provider_config: None,
        }
    }

    /// Subscribes to the provider's auth state notifications. Calling it
    /// again is a no-op.
    pub fn attach(&self) {
        let mut subscription = self.inner.subscription.lock().unwrap();
        if subscription.is_some() {
            return;
        }
        let weak: Weak<AccountAuthInner> = Arc::downgrade(&self.inner);
        let unsubscribe = self
            .inner
            .provider
            .on_auth_state_changed(Arc::new(move |user: Option<Arc<User>>| {
                if let Some(inner) = weak.upgrade() {
                    AccountAuth { inner }.handle_auth_state_changed(user);
                }
            }));
        *subscription = Some(unsubscribe);
    }

    pub fn detach(&self) {
        self.inner.detach();
    }

    /// Starts sign-in with the configured provider: a redirect where popups
    /// are unreliable, a popup everywhere else.
    pub async fn sign_in_with_provider(&self, view: Option<PreAttemptView>) -> AuthResult<()> {
        let tracker = &self.inner.tracker;
        if tracker.config().redirect_prone {
            return tracker.start_redirect_sign_in(view).await;
        }

        let user = tracker.sign_in_with_popup().await?;
        *self.inner.current_user.lock().unwrap() = Some(user);
        *self.inner.view_to_restore.lock().unwrap() = view;
        Ok(())
    }

    /// Signs in with an email/password account.
    ///
    /// Malformed input is reported without contacting the provider. Any
    /// redirect or popup attempt still pending is dropped first, so this is
    /// also the way out after a mobile redirect gave up.
    pub async fn sign_in_with_email(&self, email: &str, password: &str) -> AuthResult<Arc<User>> {
        let redirect_prone = self.inner.tracker.config().redirect_prone;
        let email = match validate_email_sign_in(email, password) {
            Ok(email) => email,
            Err(err) => {
                self.inner
                    .presenter
                    .show_error(&user_message(&err, redirect_prone));
                return Err(err);
            }
        };

        self.inner.tracker.reset();
        self.inner.presenter.show_completing_sign_in();
        LOGGER.info("starting email sign-in");
        let result = {
            let _in_flight = InFlight::mark(&self.inner.email_sign_in);
            self.inner
                .provider
                .sign_in_with_email_and_password(email, password)
                .await
        };

        let err = match result {
            Ok(credential) if credential.user.is_valid() => {
                let user = credential.user;
                *self.inner.current_user.lock().unwrap() = Some(user.clone());
                LOGGER.info(format!("signed in with email as {}", user.uid));
                self.inner.presenter.show_authenticated(&user);
                return Ok(user);
            }
            Ok(_) => AuthError::provider("auth/internal-error", "Sign-in returned no user."),
            Err(err) => err,
        };
        LOGGER.warn(format!("email sign-in failed: {err}"));
        self.inner
            .presenter
            .show_error(&user_message(&err, redirect_prone));
        Err(err)
    }

    /// Resumes a redirect attempt persisted before the page loaded.
    pub async fn handle_page_load(&self) -> AuthResult<TrackerState> {
        self.check_redirect_result().await
    }

    /// Re-checks for a redirect result when the page comes back into view.
    ///
    /// Returns `None` when there was nothing to check.
    pub async fn handle_lifecycle_event(
        &self,
        event: LifecycleEvent,
    ) -> AuthResult<Option<TrackerState>> {
        if !self.awaiting_redirect() {
            return Ok(None);
        }
        let delay = event.settle_delay();
        if !delay.is_zero() {
            self.inner.clock.sleep(delay).await;
        }
        // The attempt may have resolved while settling.
        if !self.awaiting_redirect() {
            return Ok(None);
        }
        LOGGER.debug(format!("checking redirect result after {event:?}"));
        self.check_redirect_result().await.map(Some)
    }

    /// Reacts to a change of the signed-in identity.
    pub fn handle_auth_state_changed(&self, user: Option<Arc<User>>) {
        match user {
            Some(user) => {
                *self.inner.current_user.lock().unwrap() = Some(user.clone());
                let view = self.inner.tracker.pre_attempt_view();
                let resolved = self.inner.tracker.observe_authenticated(user.clone());
                if resolved {
                    *self.inner.view_to_restore.lock().unwrap() = view;
                }
                let already_shown = matches!(
                    self.inner.tracker.state(),
                    TrackerState::Authenticated { .. }
                );
                // The popup or email call announces its own result.
                let interactive = self.inner.tracker.is_popup_open()
                    || self.inner.email_sign_in.load(Ordering::SeqCst);
                if !resolved && !already_shown && !interactive {
                    self.inner.presenter.show_authenticated(&user);
                }
            }
            None => {
                *self.inner.current_user.lock().unwrap() = None;
                if self.inner.tracker.state().is_terminal() || !self.awaiting_redirect() {
                    return;
                }
                // Signed out while an attempt is pending: the redirect result
                // has not been consumed yet.
                self.inner.presenter.show_completing_sign_in();
                let auth = self.clone();
                runtime::spawn_detached(async move {
                    if let Err(err) = auth.check_redirect_result().await {
                        LOGGER.warn(format!("scheduled redirect check failed: {err}"));
                    }
                });
            }
        }
    }

    pub fn cancel_sign_in(&self) -> bool {
        self.inner.tracker.cancel()
    }

    /// "Try again": drops any attempt and returns to `Idle`.
    pub fn restart_sign_in(&self) {
        LOGGER.info("restarting sign-in");
        self.inner.tracker.reset();
        *self.inner.view_to_restore.lock().unwrap() = None;
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        self.inner.tracker.reset();
        *self.inner.current_user.lock().unwrap() = None;
        if let Err(err) = self.inner.provider.sign_out().await {
            LOGGER.error(format!("sign-out failed: {err}"));
            self.inner.presenter.show_error(SIGN_OUT_FAILED);
            return Err(err);
        }
        LOGGER.info("signed out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<Arc<User>> {
        self.inner.current_user.lock().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.current_user.lock().unwrap().is_some()
    }

    pub fn state(&self) -> TrackerState {
        self.inner.tracker.state()
    }

    pub fn tracker(&self) -> &RedirectCompletionTracker {
        &self.inner.tracker
    }

    /// The view the user left to sign in, once the sign-in has completed.
    pub fn take_view_to_restore(&self) -> Option<PreAttemptView> {
        self.inner.view_to_restore.lock().unwrap().take()
    }

    fn awaiting_redirect(&self) -> bool {
        !self.is_authenticated()
            && self
                .inner
                .tracker
                .pending_attempt()
                .is_some_and(|attempt| attempt.awaits_redirect_result())
    }

    async fn check_redirect_result(&self) -> AuthResult<TrackerState> {
        // Resolving clears the attempt, so remember where the user was first.
        let view = self.inner.tracker.pre_attempt_view();
        let state = self.inner.tracker.check_redirect_result().await?;
        if let TrackerState::Authenticated { user, .. } = &state {
            *self.inner.current_user.lock().unwrap() = Some(user.clone());
            *self.inner.view_to_restore.lock().unwrap() = view;
        }
        Ok(state)
    }
}

/// Marks an interactive sign-in as running until dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn mark(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AccountAuthInner {
    fn detach(&self) {
        let unsubscribe = self.subscription.lock().unwrap().take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
    }
}

impl Drop for AccountAuthInner {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::auth::error::{AuthError, FailureReason};
    use crate::auth::model::UserCredential;
    use crate::auth::oauth::RedirectMethod;
    use crate::auth::persistence::InMemoryFlagStore;
    use crate::auth::presenter::{PresentedStatus, StatusBoard};
    use crate::test_support::{until, ManualClock, RedirectResponse, ScriptedProvider};

    const NOW: i64 = 1_700_000_000_000;

    struct Page {
        provider: Arc<ScriptedProvider>,
        flags: Arc<InMemoryFlagStore>,
        board: Arc<StatusBoard>,
        clock: Arc<ManualClock>,
    }

    impl Page {
        fn new() -> Self {
            Self {
                provider: ScriptedProvider::new(),
                flags: InMemoryFlagStore::shared(),
                board: StatusBoard::shared(),
                clock: ManualClock::starting_at(NOW),
            }
        }

        fn load(&self, config: TrackerConfig) -> AccountAuth {
            let auth = AccountAuth::builder(
                self.provider.clone(),
                self.flags.clone(),
                self.board.clone(),
            )
            .clock(self.clock.clone())
            .config(config)
            .build()
            .unwrap();
            auth.attach();
            auth
        }
    }

    fn user(uid: &str) -> User {
        User::new(uid).with_display_name("Ada")
    }

    fn announcements(board: &StatusBoard) -> usize {
        board
            .history()
            .into_iter()
            .filter(|status| matches!(status, PresentedStatus::Authenticated(_)))
            .count()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mobile_sign_in_survives_the_redirect() {
        let page = Page::new();
        let before = page.load(TrackerConfig::mobile());
        before
            .sign_in_with_provider(Some(PreAttemptView::new("pricing")))
            .await
            .unwrap();
        assert_eq!(page.provider.start_redirect_calls(), 1);
        assert_eq!(page.provider.popup_calls(), 0);
        drop(before);

        let after = page.load(TrackerConfig::mobile());
        page.provider
            .script_redirect_results([RedirectResponse::User(user("u1"))]);
        let state = after.handle_page_load().await.unwrap();

        assert!(matches!(state, TrackerState::Authenticated { method: RedirectMethod::Redirect, .. }));
        assert_eq!(after.current_user().unwrap().uid, "u1");
        assert_eq!(after.take_view_to_restore(), Some(PreAttemptView::new("pricing")));
        assert!(page.flags.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn desktop_signs_in_with_a_popup() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());
        page.provider
            .set_popup_result(Ok(UserCredential::new(user("u1"))));

        auth.sign_in_with_provider(None).await.unwrap();

        assert!(auth.is_authenticated());
        assert_eq!(page.provider.start_redirect_calls(), 0);
        assert!(page.flags.is_empty());
        assert!(matches!(
            auth.state(),
            TrackerState::Authenticated { method: RedirectMethod::Popup, .. }
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn popup_sign_in_is_announced_once() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());
        // The provider notifies listeners before the popup call returns.
        page.provider
            .set_popup_result(Ok(UserCredential::new(user("u1"))));

        auth.sign_in_with_provider(None).await.unwrap();

        assert_eq!(auth.current_user().unwrap().uid, "u1");
        assert_eq!(announcements(&page.board), 1);
        assert_eq!(
            page.board.history(),
            vec![
                PresentedStatus::CompletingSignIn,
                PresentedStatus::Authenticated(Arc::new(user("u1"))),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelling_an_open_desktop_popup() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());

        let (result, cancelled) = futures::join!(auth.sign_in_with_provider(None), async {
            until(|| auth.tracker().is_popup_open()).await;
            auth.cancel_sign_in()
        });

        assert!(cancelled);
        assert!(result.is_err());
        assert_eq!(auth.state(), TrackerState::Failed(FailureReason::Cancelled));
        assert!(!auth.is_authenticated());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn email_sign_in_checks_input_before_calling_the_provider() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::mobile());

        assert!(auth.sign_in_with_email("ada@example.com", "").await.is_err());
        assert!(auth.sign_in_with_email("ada.example.com", "secret").await.is_err());

        assert_eq!(page.provider.email_calls(), 0);
        assert_eq!(
            page.board.errors(),
            vec![
                "Please enter both email and password.",
                "Please enter a valid email address.",
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn email_sign_in_replaces_a_pending_redirect() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::mobile());
        auth.sign_in_with_provider(None).await.unwrap();
        assert!(!page.flags.is_empty());
        page.provider.set_email_result(Ok(UserCredential::new(
            user("u1").with_email("ada@example.com"),
        )));

        let signed_in = auth
            .sign_in_with_email("ada@example.com", "secret")
            .await
            .unwrap();

        assert_eq!(signed_in.uid, "u1");
        assert!(auth.is_authenticated());
        assert_eq!(auth.state(), TrackerState::Idle);
        assert!(page.flags.is_empty());
        assert_eq!(page.provider.email_calls(), 1);
        assert_eq!(announcements(&page.board), 1);
        assert!(matches!(
            page.board.current(),
            Some(PresentedStatus::Authenticated(user)) if user.uid == "u1"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejected_email_sign_in_is_reported() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());

        let err = auth
            .sign_in_with_email("ada@example.com", "secret")
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(&crate::auth::error::AuthErrorCode::UserNotFound));
        assert!(!auth.is_authenticated());
        assert!(page.board.errors()[0].starts_with("No account found"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn closed_desktop_popup_is_reported() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());
        page.provider
            .set_popup_result(Err(AuthError::provider("auth/popup-closed-by-user", "closed")));

        let err = auth.sign_in_with_provider(None).await.unwrap_err();

        assert!(err.code().is_some());
        assert_eq!(auth.state(), TrackerState::Failed(FailureReason::PopupClosed));
        assert_eq!(page.board.errors(), vec!["Sign-in was cancelled. Please try again."]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn auth_state_notification_resolves_pending_attempt() {
        let page = Page::new();
        let before = page.load(TrackerConfig::mobile());
        before.sign_in_with_provider(None).await.unwrap();
        drop(before);

        let auth = page.load(TrackerConfig::mobile());
        page.provider.emit(Some(user("u1")));

        assert!(auth.is_authenticated());
        assert!(matches!(auth.state(), TrackerState::Authenticated { .. }));
        assert!(page.flags.is_empty());
        // Polling afterwards finds nothing left to do.
        assert!(auth.handle_page_load().await.unwrap().is_terminal());
        assert_eq!(page.provider.redirect_calls(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn signed_in_page_load_just_shows_the_user() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());

        page.provider.emit(Some(user("u1")));

        assert_eq!(auth.state(), TrackerState::Idle);
        assert!(matches!(
            page.board.current(),
            Some(PresentedStatus::Authenticated(user)) if user.uid == "u1"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn signed_out_notification_schedules_a_check() {
        let page = Page::new();
        let before = page.load(TrackerConfig::desktop().with_null_result_threshold(5));
        // Desktop pages can still resume a redirect started elsewhere.
        before.tracker().start_redirect_sign_in(None).await.unwrap();
        drop(before);

        let auth = page.load(TrackerConfig::desktop().with_null_result_threshold(5));
        page.provider.script_redirect_results([
            RedirectResponse::Empty,
            RedirectResponse::User(user("u1")),
        ]);
        page.provider.emit(None);

        until(|| auth.is_authenticated()).await;
        assert_eq!(page.provider.redirect_calls(), 2);
        assert!(matches!(
            page.board.current(),
            Some(PresentedStatus::Authenticated(user)) if user.uid == "u1"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lifecycle_events_only_check_pending_attempts() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::mobile());

        let state = auth.handle_lifecycle_event(LifecycleEvent::Visible).await.unwrap();
        assert_eq!(state, None);
        assert!(page.clock.sleeps().is_empty());

        auth.sign_in_with_provider(None).await.unwrap();
        page.provider
            .script_redirect_results([RedirectResponse::User(user("u1"))]);
        let state = auth.handle_lifecycle_event(LifecycleEvent::Focus).await.unwrap();

        assert!(matches!(state, Some(TrackerState::Authenticated { .. })));
        assert_eq!(page.clock.sleeps()[0], Duration::from_millis(500));
        assert_eq!(
            auth.handle_lifecycle_event(LifecycleEvent::Resume).await.unwrap(),
            None
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sign_out_clears_the_session() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::mobile());
        page.provider.emit(Some(user("u1")));
        assert!(auth.is_authenticated());

        auth.sign_out().await.unwrap();

        assert!(!auth.is_authenticated());
        assert_eq!(auth.state(), TrackerState::Idle);
        assert_eq!(page.provider.sign_out_calls(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_sign_out_is_reported() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::mobile());
        page.provider
            .fail_sign_out(AuthError::provider("auth/network-request-failed", "offline"));

        assert!(auth.sign_out().await.is_err());
        assert_eq!(page.board.errors(), vec![SIGN_OUT_FAILED]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn restart_and_cancel_clear_the_attempt() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::mobile());
        auth.sign_in_with_provider(None).await.unwrap();

        assert!(auth.cancel_sign_in());
        assert_eq!(auth.state(), TrackerState::Failed(FailureReason::Cancelled));
        assert!(page.flags.is_empty());
        assert!(!page
            .board
            .history()
            .contains(&PresentedStatus::EmailSignInSuggested));

        auth.sign_in_with_provider(None).await.unwrap();
        auth.restart_sign_in();
        assert_eq!(auth.state(), TrackerState::Idle);
        assert!(page.flags.is_empty());
    }

    #[test]
    fn detaching_removes_the_listener() {
        let page = Page::new();
        let auth = page.load(TrackerConfig::desktop());
        auth.attach();
        assert_eq!(page.provider.listener_count(), 1);

        drop(auth);
        assert_eq!(page.provider.listener_count(), 0);
    }
}
