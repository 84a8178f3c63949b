#![doc = include_str!("README.md")]
mod email;
mod error;
mod logger;
mod manager;
mod messages;
mod model;
mod oauth;
mod persistence;
mod presenter;
mod tracker;

pub use email::{is_valid_email, validate_email_sign_in, EMAIL_PROVIDER_ID};

#[doc(inline)]
pub use error::{AuthError, AuthErrorCode, AuthResult, FailureReason};

#[doc(inline)]
pub use manager::{AccountAuth, AccountAuthBuilder, LifecycleEvent};

pub use messages::{
    failure_message, fallback_notice, user_message, COMPLETING_SIGN_IN,
    EMAIL_SIGN_IN_SUGGESTION, SIGN_OUT_FAILED,
};

#[doc(inline)]
pub use model::{AuthStateListener, AuthStateListeners, Unsubscribe, User, UserCredential};

#[doc(inline)]
pub use oauth::{
    AuthProvider, PreAttemptView, ProviderConfig, RedirectAttempt, RedirectAttemptStore,
    RedirectMethod, GOOGLE_PROVIDER_ID,
};

/// Storage keys of the persisted attempt.
pub use oauth::{IN_PROGRESS_KEY, METHOD_KEY, PRE_ATTEMPT_VIEW_KEY, TIMESTAMP_KEY};

#[doc(inline)]
pub use persistence::{FlagStore, InMemoryFlagStore, MirroredFlagStore, DEFAULT_MIRROR_PREFIX};

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
#[doc(inline)]
pub use persistence::{WebStorageDriver, WebStorageFlagStore};

#[doc(inline)]
pub use presenter::{PresentedStatus, Presenter, StatusBoard};

#[doc(inline)]
pub use tracker::{
    FallbackReason, RedirectCompletionTracker, TrackerBuilder, TrackerConfig,
    TrackerConfigUpdate, TrackerState,
};

pub use tracker::{
    DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_NULL_RESULT_THRESHOLD, DEFAULT_PER_CALL_TIMEOUT,
    DEFAULT_POLL_INTERVAL, DEFAULT_POPUP_TIMEOUT, DESKTOP_STALE_AFTER, MOBILE_STALE_AFTER,
};
