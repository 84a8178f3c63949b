use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future;

use crate::auth::{
    AuthError, AuthProvider, AuthResult, AuthStateListener, AuthStateListeners, ProviderConfig,
    Unsubscribe, User, UserCredential,
};

/// One scripted answer to "get redirect result".
#[derive(Debug, Clone)]
pub enum RedirectResponse {
    Empty,
    User(User),
    Error(AuthError),
    /// Never resolves.
    Hang,
}

/// Auth provider whose answers are queued up front.
///
/// Once the redirect script runs out every further call answers `Empty`.
/// Like the hosted SDK, a successful popup or email sign-in fires the auth
/// state listeners before the call returns.
pub struct ScriptedProvider {
    redirect_script: Mutex<VecDeque<RedirectResponse>>,
    popup_result: Mutex<Option<AuthResult<UserCredential>>>,
    popup_held: AtomicBool,
    email_result: Mutex<Option<AuthResult<UserCredential>>>,
    start_redirect_error: Mutex<Option<AuthError>>,
    sign_out_error: Mutex<Option<AuthError>>,
    ready: AtomicBool,
    ready_checks: AtomicUsize,
    redirect_calls: AtomicUsize,
    popup_calls: AtomicUsize,
    email_calls: AtomicUsize,
    start_redirect_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    listeners: AuthStateListeners,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            redirect_script: Mutex::new(VecDeque::new()),
            popup_result: Mutex::new(None),
            popup_held: AtomicBool::new(false),
            email_result: Mutex::new(None),
            start_redirect_error: Mutex::new(None),
            sign_out_error: Mutex::new(None),
            ready: AtomicBool::new(true),
            ready_checks: AtomicUsize::new(0),
            redirect_calls: AtomicUsize::new(0),
            popup_calls: AtomicUsize::new(0),
            email_calls: AtomicUsize::new(0),
            start_redirect_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            listeners: AuthStateListeners::default(),
        })
    }

    pub fn script_redirect_results(&self, responses: impl IntoIterator<Item = RedirectResponse>) {
        self.redirect_script.lock().unwrap().extend(responses);
    }

    pub fn set_popup_result(&self, result: AuthResult<UserCredential>) {
        *self.popup_result.lock().unwrap() = Some(result);
    }

    /// Keeps the popup open, even with a result set, until released.
    pub fn hold_popup(&self) {
        self.popup_held.store(true, Ordering::SeqCst);
    }

    pub fn release_popup(&self) {
        self.popup_held.store(false, Ordering::SeqCst);
    }

    /// Without a result, email sign-in fails with `auth/user-not-found`.
    pub fn set_email_result(&self, result: AuthResult<UserCredential>) {
        *self.email_result.lock().unwrap() = Some(result);
    }

    pub fn fail_start_redirect(&self, error: AuthError) {
        *self.start_redirect_error.lock().unwrap() = Some(error);
    }

    pub fn fail_sign_out(&self, error: AuthError) {
        *self.sign_out_error.lock().unwrap() = Some(error);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Fires the auth state listeners as the SDK would.
    pub fn emit(&self, user: Option<User>) {
        self.listeners.notify(user.map(Arc::new));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn ready_checks(&self) -> usize {
        self.ready_checks.load(Ordering::SeqCst)
    }

    pub fn redirect_calls(&self) -> usize {
        self.redirect_calls.load(Ordering::SeqCst)
    }

    pub fn popup_calls(&self) -> usize {
        self.popup_calls.load(Ordering::SeqCst)
    }

    pub fn email_calls(&self) -> usize {
        self.email_calls.load(Ordering::SeqCst)
    }

    pub fn start_redirect_calls(&self) -> usize {
        self.start_redirect_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

impl ScriptedProvider {
    fn signed_in(&self, result: AuthResult<UserCredential>) -> AuthResult<UserCredential> {
        if let Ok(credential) = &result {
            self.listeners.notify(Some(credential.user.clone()));
        }
        result
    }
}

#[async_trait]
impl AuthProvider for ScriptedProvider {
    async fn is_ready(&self) -> bool {
        self.ready_checks.fetch_add(1, Ordering::SeqCst);
        self.ready.load(Ordering::SeqCst)
    }

    async fn start_redirect_sign_in(&self, _config: &ProviderConfig) -> AuthResult<()> {
        self.start_redirect_calls.fetch_add(1, Ordering::SeqCst);
        match self.start_redirect_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn start_popup_sign_in(&self, _config: &ProviderConfig) -> AuthResult<UserCredential> {
        self.popup_calls.fetch_add(1, Ordering::SeqCst);
        while self.popup_held.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let result = self.popup_result.lock().unwrap().take();
        match result {
            Some(result) => self.signed_in(result),
            None => future::pending().await,
        }
    }

    async fn get_pending_redirect_result(&self) -> AuthResult<Option<UserCredential>> {
        self.redirect_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.redirect_script.lock().unwrap().pop_front();
        match next.unwrap_or(RedirectResponse::Empty) {
            RedirectResponse::Empty => Ok(None),
            RedirectResponse::User(user) => Ok(Some(UserCredential::new(user))),
            RedirectResponse::Error(err) => Err(err),
            RedirectResponse::Hang => future::pending().await,
        }
    }

    async fn sign_in_with_email_and_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> AuthResult<UserCredential> {
        self.email_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.email_result.lock().unwrap().take();
        self.signed_in(result.unwrap_or_else(|| {
            Err(AuthError::provider("auth/user-not-found", "EMAIL_NOT_FOUND"))
        }))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        match self.sign_out_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => {
                self.emit(None);
                Ok(())
            }
        }
    }

    fn on_auth_state_changed(&self, listener: AuthStateListener) -> Unsubscribe {
        self.listeners.add(listener)
    }
}
