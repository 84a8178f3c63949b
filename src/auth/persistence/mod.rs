use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::auth::error::AuthResult;

/// Flat string key/value storage that survives a full page reload.
///
/// Browsers back this with `sessionStorage` / `localStorage`; tests and
/// native embedders use [`InMemoryFlagStore`]. Implementations write one key
/// per call, so readers may observe a partially written attempt and must
/// treat missing keys as "not in progress".
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> AuthResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AuthResult<()>;
    fn remove(&self, key: &str) -> AuthResult<()>;
}

#[derive(Default, Debug)]
pub struct InMemoryFlagStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryFlagStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FlagStore for InMemoryFlagStore {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Writes every flag to two stores and reads the primary first.
///
/// Some mobile browsers drop `sessionStorage` when the provider page opens in
/// a new browsing context; mirroring into `localStorage` under a prefix keeps
/// the attempt visible on return.
pub struct MirroredFlagStore {
    primary: Arc<dyn FlagStore>,
    fallback: Arc<dyn FlagStore>,
    fallback_prefix: String,
}

pub const DEFAULT_MIRROR_PREFIX: &str = "yamu_temp_";

impl MirroredFlagStore {
    pub fn new(primary: Arc<dyn FlagStore>, fallback: Arc<dyn FlagStore>) -> Self {
        Self::with_prefix(primary, fallback, DEFAULT_MIRROR_PREFIX)
    }

    pub fn with_prefix(
        primary: Arc<dyn FlagStore>,
        fallback: Arc<dyn FlagStore>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            fallback_prefix: prefix.into(),
        }
    }

    fn fallback_key(&self, key: &str) -> String {
        format!("{}{}", self.fallback_prefix, key)
    }
}

impl FlagStore for MirroredFlagStore {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        match self.primary.get(key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(err) => log::warn!("primary flag store read failed for `{key}`: {err}"),
        }
        self.fallback.get(&self.fallback_key(key))
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        let primary = self.primary.set(key, value);
        let fallback = self.fallback.set(&self.fallback_key(key), value);
        match (primary, fallback) {
            (Err(err), Err(_)) => Err(err),
            (Err(err), Ok(())) | (Ok(()), Err(err)) => {
                log::warn!("flag `{key}` only written to one store: {err}");
                Ok(())
            }
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        let primary = self.primary.remove(key);
        let fallback = self.fallback.remove(&self.fallback_key(key));
        primary.and(fallback)
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub mod web;

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use web::{WebStorageDriver, WebStorageFlagStore};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::AuthError;

    struct BrokenStore;

    impl FlagStore for BrokenStore {
        fn get(&self, _key: &str) -> AuthResult<Option<String>> {
            Err(AuthError::Storage("quota exceeded".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> AuthResult<()> {
            Err(AuthError::Storage("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> AuthResult<()> {
            Err(AuthError::Storage("quota exceeded".into()))
        }
    }

    #[test]
    fn mirrored_store_reads_fallback_when_primary_lost_the_key() {
        let session = InMemoryFlagStore::shared();
        let local = InMemoryFlagStore::shared();
        let store = MirroredFlagStore::new(session.clone(), local.clone());

        store.set("yamuOAuthInProgress", "true").unwrap();
        assert_eq!(
            local.get("yamu_temp_yamuOAuthInProgress").unwrap().as_deref(),
            Some("true")
        );

        // Simulate the browser discarding session storage across the redirect.
        session.remove("yamuOAuthInProgress").unwrap();
        assert_eq!(
            store.get("yamuOAuthInProgress").unwrap().as_deref(),
            Some("true")
        );

        store.remove("yamuOAuthInProgress").unwrap();
        assert!(local.is_empty());
        assert_eq!(store.get("yamuOAuthInProgress").unwrap(), None);
    }

    #[test]
    fn mirrored_store_tolerates_one_broken_backend() {
        let local = InMemoryFlagStore::shared();
        let store = MirroredFlagStore::new(Arc::new(BrokenStore), local.clone());

        store.set("key", "value").unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("value"));

        let both_broken = MirroredFlagStore::new(Arc::new(BrokenStore), Arc::new(BrokenStore));
        assert!(both_broken.set("key", "value").is_err());
    }
}
