//! User-facing text for sign-in failures.

use crate::auth::error::{AuthError, AuthErrorCode, FailureReason};
use crate::auth::tracker::FallbackReason;

pub const COMPLETING_SIGN_IN: &str = "Completing sign-in...";
pub const SIGN_OUT_FAILED: &str = "Failed to sign out. Please try again.";
pub const EMAIL_SIGN_IN_SUGGESTION: &str =
    "Consider using email sign-in for better mobile experience";

/// Maps an auth error to the message shown in the sign-in panel.
pub fn user_message(error: &AuthError, redirect_prone: bool) -> String {
    let code = match error {
        AuthError::Provider { code, .. } => code,
        AuthError::ProviderNotReady(_) => {
            return "Sign-in is temporarily unavailable. Please reload the page.".into()
        }
        AuthError::Storage(_) => {
            return "Your browser blocked the storage needed to sign in. \
                    Please allow site data and try again."
                .into()
        }
        AuthError::InvalidConfig(_) => {
            return "Sign-in is misconfigured. Please contact support.".into()
        }
    };

    let text = match code {
        AuthErrorCode::PopupBlocked if redirect_prone => {
            "Sign-in was blocked. Please try again or use a different browser."
        }
        AuthErrorCode::PopupBlocked => "Pop-up was blocked. Please allow pop-ups and try again.",
        AuthErrorCode::PopupClosedByUser | AuthErrorCode::CancelledPopupRequest => {
            "Sign-in was cancelled. Please try again."
        }
        AuthErrorCode::RedirectCancelledByUser => {
            "Sign-in was cancelled. You can try again or use email/password instead."
        }
        AuthErrorCode::RedirectOperationPending => {
            "Another sign-in attempt is in progress. Please wait a moment."
        }
        AuthErrorCode::NetworkRequestFailed if redirect_prone => {
            "Network error. Please check your mobile connection and try again."
        }
        AuthErrorCode::NetworkRequestFailed => {
            "Network error. Please check your internet connection and try again."
        }
        AuthErrorCode::Timeout => "Request timed out. Please check your connection and try again.",
        AuthErrorCode::TooManyRequests => {
            "Too many failed attempts. Please wait a few minutes and try again."
        }
        AuthErrorCode::InternalError => {
            "An internal error occurred. Please try again in a few moments."
        }
        AuthErrorCode::UnauthorizedDomain => {
            "This website is not authorized for sign-in. Please contact support."
        }
        AuthErrorCode::UserDisabled => {
            "This account has been disabled. Please contact support for assistance."
        }
        AuthErrorCode::CredentialAlreadyInUse => {
            "This Google account is already linked to another user. Please try a different account."
        }
        AuthErrorCode::AccountExistsWithDifferentCredential => {
            "An account already exists with this email using a different sign-in method."
        }
        AuthErrorCode::MissingEmail | AuthErrorCode::MissingPassword => {
            "Please enter both email and password."
        }
        AuthErrorCode::InvalidEmail => "Please enter a valid email address.",
        AuthErrorCode::UserNotFound => {
            "No account found with this email address. Please check your email or create an account."
        }
        AuthErrorCode::WrongPassword => "Incorrect password. Please try again or reset your password.",
        AuthErrorCode::InvalidCredential => {
            "Invalid credentials. Please check your email and password."
        }
        AuthErrorCode::WeakPassword => {
            "Password is too weak. Please choose a stronger password (at least 6 characters)."
        }
        AuthErrorCode::EmailAlreadyInUse => {
            "An account with this email already exists. Please sign in instead."
        }
        AuthErrorCode::Other(_) => return fallback_message(error, redirect_prone),
    };
    text.to_string()
}

fn fallback_message(error: &AuthError, redirect_prone: bool) -> String {
    let base = match error {
        AuthError::Provider { message, .. } if !message.is_empty() => message.clone(),
        _ => "Authentication failed. Please try again.".to_string(),
    };
    if redirect_prone && base.to_ascii_lowercase().contains("redirect") {
        format!("{base} If this persists, try using email/password sign-in instead.")
    } else {
        base
    }
}

/// The single terminal message for a failed attempt.
pub fn failure_message(reason: &FailureReason, redirect_prone: bool) -> String {
    match reason {
        FailureReason::Cancelled => "Sign-in was cancelled. Please try again.".into(),
        FailureReason::Timeout if redirect_prone => "Sign-in timed out. This can happen on mobile \
             browsers. Please try using email/password sign-in instead, refreshing the page, \
             or checking your internet connection."
            .into(),
        FailureReason::Timeout => "Sign-in timed out. Please try again.".into(),
        FailureReason::PopupClosed => "Sign-in was cancelled. Please try again.".into(),
        FailureReason::PopupBlocked => user_message(
            &AuthError::Provider {
                code: AuthErrorCode::PopupBlocked,
                message: String::new(),
            },
            redirect_prone,
        ),
        FailureReason::Provider(error) => user_message(error, redirect_prone),
    }
}

impl FailureReason {
    /// See [`failure_message`].
    pub fn message(&self, redirect_prone: bool) -> String {
        failure_message(self, redirect_prone)
    }
}

/// Transient notice shown while switching from redirect to popup.
pub fn fallback_notice(reason: FallbackReason) -> &'static str {
    match reason {
        FallbackReason::RepeatedEmptyResults => {
            "Your browser did not return from sign-in. Switching to a sign-in window..."
        }
        FallbackReason::AttemptStale | FallbackReason::PollingExhausted => {
            "Sign-in is taking longer than expected. Switching to a sign-in window..."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_blocked_has_mobile_variant() {
        let error = AuthError::provider("auth/popup-blocked", "");
        assert!(user_message(&error, false).contains("allow pop-ups"));
        assert!(user_message(&error, true).contains("different browser"));
    }

    #[test]
    fn unknown_redirect_errors_get_mobile_hint() {
        let error = AuthError::provider("auth/web-storage-unsupported", "Unable to process redirect");
        assert_eq!(user_message(&error, false), "Unable to process redirect");
        assert!(user_message(&error, true).ends_with("email/password sign-in instead."));
    }

    #[test]
    fn timeout_failure_mentions_mobile_browsers_only_on_mobile() {
        assert!(failure_message(&FailureReason::Timeout, true).contains("mobile"));
        assert_eq!(
            failure_message(&FailureReason::Timeout, false),
            "Sign-in timed out. Please try again."
        );
    }

    #[test]
    fn email_errors_have_their_own_text() {
        let wrong = AuthError::provider("auth/wrong-password", "INVALID_PASSWORD");
        assert!(user_message(&wrong, true).starts_with("Incorrect password"));
        let missing = AuthError::provider("auth/missing-password", "");
        assert_eq!(
            user_message(&missing, false),
            "Please enter both email and password."
        );
    }

    #[test]
    fn setup_errors_do_not_read_like_sign_in_failures() {
        let message = user_message(
            &AuthError::ProviderNotReady(std::time::Duration::from_secs(5)),
            false,
        );
        assert!(message.contains("reload"));
    }
}
