//! Walks through a mobile sign-in whose redirect result never arrives.
//!
//! Run with `cargo run --example redirect_completion`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use yamu_account_auth::auth::{
    fallback_notice, AccountAuth, AuthError, AuthProvider, AuthResult, AuthStateListener,
    AuthStateListeners, FallbackReason, InMemoryFlagStore, PreAttemptView, Presenter,
    ProviderConfig, TrackerConfig, Unsubscribe, User, UserCredential, COMPLETING_SIGN_IN,
    EMAIL_SIGN_IN_SUGGESTION,
};
use yamu_account_auth::logger::{set_log_level, LogLevel};

/// Behaves like a phone browser with partitioned storage: the redirect
/// comes back empty every time, the popup works.
#[derive(Default)]
struct PartitionedBrowser {
    lookups: AtomicUsize,
    listeners: AuthStateListeners,
}

#[async_trait]
impl AuthProvider for PartitionedBrowser {
    async fn start_redirect_sign_in(&self, config: &ProviderConfig) -> AuthResult<()> {
        println!("-> navigating to {} (scopes: {:?})", config.provider_id(), config.scopes());
        Ok(())
    }

    async fn start_popup_sign_in(&self, _config: &ProviderConfig) -> AuthResult<UserCredential> {
        println!("-> popup opened");
        Ok(UserCredential::new(
            User::new("demo-user").with_email("ada@example.com"),
        ))
    }

    async fn get_pending_redirect_result(&self) -> AuthResult<Option<UserCredential>> {
        let n = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        println!("-> redirect result lookup #{n}: nothing");
        Ok(None)
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        _password: &str,
    ) -> AuthResult<UserCredential> {
        println!("-> email sign-in for {email}");
        Err(AuthError::provider("auth/user-not-found", "EMAIL_NOT_FOUND"))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.listeners.notify(None);
        Ok(())
    }

    fn on_auth_state_changed(&self, listener: AuthStateListener) -> Unsubscribe {
        self.listeners.add(listener)
    }
}

struct Console;

impl Presenter for Console {
    fn show_completing_sign_in(&self) {
        println!("[ui] {COMPLETING_SIGN_IN}");
    }

    fn show_fallback_notice(&self, reason: FallbackReason) {
        println!("[ui] {}", fallback_notice(reason));
    }

    fn show_error(&self, message: &str) {
        println!("[ui] error: {message}");
    }

    fn show_authenticated(&self, user: &User) {
        println!("[ui] signed in as {}", user.label());
    }

    fn suggest_email_sign_in(&self) {
        println!("[ui] {EMAIL_SIGN_IN_SUGGESTION}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AuthResult<()> {
    set_log_level(LogLevel::Debug);

    let browser = Arc::new(PartitionedBrowser::default());
    let flags = InMemoryFlagStore::shared();
    let config = TrackerConfig::from_json(r#"{"pollIntervalMillis": 250}"#, true)?;

    let page = AccountAuth::builder(browser.clone(), flags.clone(), Arc::new(Console))
        .config(config.clone())
        .build()?;
    page.attach();
    page.sign_in_with_provider(Some(PreAttemptView::new("settings")))
        .await?;
    drop(page);

    println!("-- page reloads --");
    let page = AccountAuth::builder(browser, flags, Arc::new(Console))
        .config(config)
        .build()?;
    page.attach();
    let state = page.handle_page_load().await?;

    println!("final state: {state}");
    if let Some(view) = page.take_view_to_restore() {
        println!("returning to: {}", view.as_str());
    }
    Ok(())
}
