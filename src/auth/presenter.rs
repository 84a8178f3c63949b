use std::sync::{Arc, Mutex};

use crate::auth::model::User;
use crate::auth::tracker::FallbackReason;

/// Rendering hooks the sign-in flow drives. The implementation owns the DOM.
///
/// Each call supersedes whatever the previous call displayed; at most one
/// status or error is visible at a time.
pub trait Presenter: Send + Sync {
    fn show_completing_sign_in(&self);
    fn show_fallback_notice(&self, reason: FallbackReason);
    fn show_error(&self, message: &str);
    fn show_authenticated(&self, user: &User);

    /// Points the user at email/password sign-in after a mobile sign-in
    /// failure. Shown alongside the error rather than replacing it; pages
    /// without an email form can ignore it.
    fn suggest_email_sign_in(&self) {}
}

/// What a [`Presenter`] was last asked to display.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentedStatus {
    CompletingSignIn,
    FallbackNotice(FallbackReason),
    Error(String),
    Authenticated(Arc<User>),
    EmailSignInSuggested,
}

/// Presenter that keeps the current status and the full history.
///
/// Useful as a headless presenter and as the inner state of a DOM presenter
/// that re-renders from `current()`.
#[derive(Default)]
pub struct StatusBoard {
    history: Mutex<Vec<PresentedStatus>>,
}

impl StatusBoard {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> Option<PresentedStatus> {
        self.history.lock().unwrap().last().cloned()
    }

    pub fn history(&self) -> Vec<PresentedStatus> {
        self.history.lock().unwrap().clone()
    }

    /// Messages passed to `show_error`, oldest first.
    pub fn errors(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter_map(|status| match status {
                PresentedStatus::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, status: PresentedStatus) {
        self.history.lock().unwrap().push(status);
    }
}

impl Presenter for StatusBoard {
    fn show_completing_sign_in(&self) {
        self.push(PresentedStatus::CompletingSignIn);
    }

    fn show_fallback_notice(&self, reason: FallbackReason) {
        self.push(PresentedStatus::FallbackNotice(reason));
    }

    fn show_error(&self, message: &str) {
        self.push(PresentedStatus::Error(message.to_string()));
    }

    fn show_authenticated(&self, user: &User) {
        self.push(PresentedStatus::Authenticated(Arc::new(user.clone())));
    }

    fn suggest_email_sign_in(&self) {
        self.push(PresentedStatus::EmailSignInSuggested);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_call_supersedes_previous_status() {
        let board = StatusBoard::default();
        board.show_completing_sign_in();
        board.show_error("Sign-in timed out. Please try again.");
        board.show_authenticated(&User::new("u1"));

        assert!(matches!(
            board.current(),
            Some(PresentedStatus::Authenticated(user)) if user.uid == "u1"
        ));
        assert_eq!(board.errors().len(), 1);
        assert_eq!(board.history().len(), 3);
    }
}
