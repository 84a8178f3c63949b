mod provider;
mod redirect;

// Re-export selected items for public use
pub use provider::{ProviderConfig, GOOGLE_PROVIDER_ID};
pub use redirect::{
    PreAttemptView, RedirectAttempt, RedirectAttemptStore, RedirectMethod, IN_PROGRESS_KEY,
    METHOD_KEY, PRE_ATTEMPT_VIEW_KEY, TIMESTAMP_KEY,
};

use async_trait::async_trait;

use crate::auth::error::AuthResult;
use crate::auth::model::{AuthStateListener, Unsubscribe, UserCredential};

/// The hosted auth SDK, seen from the sign-in flow.
///
/// Browser builds implement this over the JS SDK; tests use scripted fakes.
/// None of the calls are trusted to respect their own timeouts: the redirect
/// tracker bounds every call it makes.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait AuthProvider: Send + Sync {
    /// Whether the SDK has finished loading and can serve requests.
    async fn is_ready(&self) -> bool {
        true
    }

    /// Navigates away to the provider. On the success path in a browser this
    /// never resolves because the page unloads.
    async fn start_redirect_sign_in(&self, config: &ProviderConfig) -> AuthResult<()>;

    /// Opens the provider in a popup and resolves once the user finishes or
    /// dismisses it.
    async fn start_popup_sign_in(&self, config: &ProviderConfig) -> AuthResult<UserCredential>;

    /// Returns the credential produced by a completed redirect, `None` when
    /// no result is (yet) available.
    async fn get_pending_redirect_result(&self) -> AuthResult<Option<UserCredential>>;

    /// Signs in with an email/password account. No redirect or popup is
    /// involved.
    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<UserCredential>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Registers a listener fired with the signed-in user, or `None` after
    /// sign-out, whenever the identity changes.
    fn on_auth_state_changed(&self, listener: AuthStateListener) -> Unsubscribe;
}
