use std::fmt;
use std::time::Duration;

pub type AuthResult<T> = Result<T, AuthError>;

/// Error codes reported by the hosted auth SDK (`auth/<code>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    PopupBlocked,
    PopupClosedByUser,
    CancelledPopupRequest,
    RedirectCancelledByUser,
    RedirectOperationPending,
    NetworkRequestFailed,
    Timeout,
    TooManyRequests,
    InternalError,
    UnauthorizedDomain,
    UserDisabled,
    CredentialAlreadyInUse,
    AccountExistsWithDifferentCredential,
    MissingEmail,
    MissingPassword,
    InvalidEmail,
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    WeakPassword,
    EmailAlreadyInUse,
    Other(String),
}

impl AuthErrorCode {
    /// Parses either the bare code or the `auth/`-prefixed form.
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        let bare = trimmed.strip_prefix("auth/").unwrap_or(trimmed);
        match bare {
            "popup-blocked" => AuthErrorCode::PopupBlocked,
            "popup-closed-by-user" => AuthErrorCode::PopupClosedByUser,
            "cancelled-popup-request" => AuthErrorCode::CancelledPopupRequest,
            "redirect-cancelled-by-user" => AuthErrorCode::RedirectCancelledByUser,
            "redirect-operation-pending" => AuthErrorCode::RedirectOperationPending,
            "network-request-failed" => AuthErrorCode::NetworkRequestFailed,
            "timeout" => AuthErrorCode::Timeout,
            "too-many-requests" => AuthErrorCode::TooManyRequests,
            "internal-error" => AuthErrorCode::InternalError,
            "unauthorized-domain" => AuthErrorCode::UnauthorizedDomain,
            "user-disabled" => AuthErrorCode::UserDisabled,
            "credential-already-in-use" => AuthErrorCode::CredentialAlreadyInUse,
            "account-exists-with-different-credential" => {
                AuthErrorCode::AccountExistsWithDifferentCredential
            }
            "missing-email" => AuthErrorCode::MissingEmail,
            "missing-password" => AuthErrorCode::MissingPassword,
            "invalid-email" => AuthErrorCode::InvalidEmail,
            "user-not-found" => AuthErrorCode::UserNotFound,
            "wrong-password" => AuthErrorCode::WrongPassword,
            "invalid-credential" => AuthErrorCode::InvalidCredential,
            "weak-password" => AuthErrorCode::WeakPassword,
            "email-already-in-use" => AuthErrorCode::EmailAlreadyInUse,
            other => AuthErrorCode::Other(format!("auth/{other}")),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AuthErrorCode::PopupBlocked => "auth/popup-blocked",
            AuthErrorCode::PopupClosedByUser => "auth/popup-closed-by-user",
            AuthErrorCode::CancelledPopupRequest => "auth/cancelled-popup-request",
            AuthErrorCode::RedirectCancelledByUser => "auth/redirect-cancelled-by-user",
            AuthErrorCode::RedirectOperationPending => "auth/redirect-operation-pending",
            AuthErrorCode::NetworkRequestFailed => "auth/network-request-failed",
            AuthErrorCode::Timeout => "auth/timeout",
            AuthErrorCode::TooManyRequests => "auth/too-many-requests",
            AuthErrorCode::InternalError => "auth/internal-error",
            AuthErrorCode::UnauthorizedDomain => "auth/unauthorized-domain",
            AuthErrorCode::UserDisabled => "auth/user-disabled",
            AuthErrorCode::CredentialAlreadyInUse => "auth/credential-already-in-use",
            AuthErrorCode::AccountExistsWithDifferentCredential => {
                "auth/account-exists-with-different-credential"
            }
            AuthErrorCode::MissingEmail => "auth/missing-email",
            AuthErrorCode::MissingPassword => "auth/missing-password",
            AuthErrorCode::InvalidEmail => "auth/invalid-email",
            AuthErrorCode::UserNotFound => "auth/user-not-found",
            AuthErrorCode::WrongPassword => "auth/wrong-password",
            AuthErrorCode::InvalidCredential => "auth/invalid-credential",
            AuthErrorCode::WeakPassword => "auth/weak-password",
            AuthErrorCode::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Error surfaced by the auth provider SDK.
    Provider { code: AuthErrorCode, message: String },
    /// The provider did not become usable within the readiness window.
    ProviderNotReady(Duration),
    /// Flag storage could not be read or written.
    Storage(String),
    InvalidConfig(String),
}

impl AuthError {
    pub fn provider(code: &str, message: impl Into<String>) -> Self {
        AuthError::Provider {
            code: AuthErrorCode::from_code(code),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&AuthErrorCode> {
        match self {
            AuthError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Setup problems are reported separately from user-facing sign-in failures.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            AuthError::ProviderNotReady(_) | AuthError::InvalidConfig(_)
        )
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Provider { code, message } if message.is_empty() => write!(f, "{code}"),
            AuthError::Provider { code, message } => write!(f, "{message} ({code})"),
            AuthError::ProviderNotReady(waited) => write!(
                f,
                "Auth provider not ready after {}ms",
                waited.as_millis()
            ),
            AuthError::Storage(message) => write!(f, "Flag storage error: {message}"),
            AuthError::InvalidConfig(message) => write!(f, "Invalid configuration: {message}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Why an attempt ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The user abandoned the attempt.
    Cancelled,
    /// The attempt went stale without a result.
    Timeout,
    PopupClosed,
    PopupBlocked,
    Provider(AuthError),
}

impl FailureReason {
    /// Classifies an error raised by the popup sign-in call.
    pub fn from_popup_error(error: AuthError) -> Self {
        match error.code() {
            Some(AuthErrorCode::PopupClosedByUser | AuthErrorCode::CancelledPopupRequest) => {
                FailureReason::PopupClosed
            }
            Some(AuthErrorCode::PopupBlocked) => FailureReason::PopupBlocked,
            _ => FailureReason::Provider(error),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Cancelled => "cancelled",
            FailureReason::Timeout => "timeout",
            FailureReason::PopupClosed => "popup-closed",
            FailureReason::PopupBlocked => "popup-blocked",
            FailureReason::Provider(_) => "provider-error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Provider(err) => write!(f, "provider-error: {err}"),
            other => f.write_str(other.as_str()),
        }
    }
}
