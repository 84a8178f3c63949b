use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Identity reported by the auth provider once sign-in succeeds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// A user without a UID cannot be a signed-in identity.
    pub fn is_valid(&self) -> bool {
        !self.uid.trim().is_empty()
    }

    /// Name shown in the account header: display name, then email, then UID.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

/// Result of a popup sign-in or a completed redirect.
#[derive(Clone, Debug, PartialEq)]
pub struct UserCredential {
    pub user: Arc<User>,
    pub provider_id: Option<String>,
}

impl UserCredential {
    pub fn new(user: User) -> Self {
        Self {
            user: Arc::new(user),
            provider_id: None,
        }
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }
}

/// Callback fired with the signed-in user, or `None` after sign-out.
pub type AuthStateListener = Arc<dyn Fn(Option<Arc<User>>) + Send + Sync + 'static>;

/// Handle returned by subscriptions; calling it removes the listener.
pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

/// Listener registry used by providers that fan out auth state changes.
#[derive(Default)]
pub struct AuthStateListeners {
    observers: Arc<Mutex<Vec<(usize, AuthStateListener)>>>,
    next_id: Mutex<usize>,
}

impl AuthStateListeners {
    /// Registers a listener and returns the handle that detaches it.
    pub fn add(&self, listener: AuthStateListener) -> Unsubscribe {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        self.observers.lock().unwrap().push((id, listener));

        let observers = Arc::downgrade(&self.observers);
        Box::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers.lock().unwrap().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Notifies all listeners with the provided user snapshot.
    pub fn notify(&self, user: Option<Arc<User>>) {
        let listeners: Vec<_> = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(user.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_prefers_display_name_then_email() {
        let user = User::new("u1").with_email("a@example.com");
        assert_eq!(user.label(), "a@example.com");
        let user = user.with_display_name("Ada");
        assert_eq!(user.label(), "Ada");
        assert_eq!(User::new("u2").label(), "u2");
    }

    #[test]
    fn blank_uid_is_invalid() {
        assert!(!User::new("  ").is_valid());
        assert!(User::new("u1").is_valid());
    }

    #[test]
    fn unsubscribe_detaches_listener() {
        let listeners = AuthStateListeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let unsubscribe = listeners.add(Arc::new(move |user: Option<Arc<User>>| {
            sink.lock().unwrap().push(user.map(|u| u.uid.clone()));
        }));

        listeners.notify(Some(Arc::new(User::new("u1"))));
        unsubscribe();
        listeners.notify(None);

        assert!(listeners.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![Some("u1".to_string())]);
    }
}
