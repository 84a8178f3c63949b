use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::auth::{AuthError, AuthResult, FlagStore, InMemoryFlagStore};

/// In-memory flags whose reads can be made to fail, as a browser does when
/// storage access is revoked mid-session. Writes always go through.
#[derive(Default)]
pub struct FlakyFlagStore {
    inner: InMemoryFlagStore,
    failing_reads: AtomicBool,
}

impl FlakyFlagStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FlagStore for FlakyFlagStore {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(AuthError::Storage(format!("read of {key} denied")));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        self.inner.remove(key)
    }
}
