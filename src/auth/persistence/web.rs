use wasm_bindgen::JsValue;
use web_sys::{Storage, Window};

use crate::auth::error::{AuthError, AuthResult};

use super::FlagStore;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WebStorageDriver {
    Local,
    Session,
}

/// [`FlagStore`] backed by the browser's Web Storage API.
///
/// The `Storage` handle is looked up on every call instead of being cached,
/// which keeps the type `Send + Sync` and tolerates storage being disabled
/// after construction (private browsing, quota eviction).
#[derive(Debug, Clone, Copy)]
pub struct WebStorageFlagStore {
    driver: WebStorageDriver,
}

impl WebStorageFlagStore {
    pub fn new(driver: WebStorageDriver) -> Self {
        Self { driver }
    }

    pub fn session() -> Self {
        Self::new(WebStorageDriver::Session)
    }

    pub fn local() -> Self {
        Self::new(WebStorageDriver::Local)
    }

    fn storage(&self) -> AuthResult<Storage> {
        let window = Self::window()?;
        match self.driver {
            WebStorageDriver::Local => window.local_storage().map_err(map_js_error)?,
            WebStorageDriver::Session => window.session_storage().map_err(map_js_error)?,
        }
        .ok_or_else(|| AuthError::Storage("Web storage API is unavailable".into()))
    }

    fn window() -> AuthResult<Window> {
        web_sys::window().ok_or_else(|| {
            AuthError::Storage("window object is not available in this environment".into())
        })
    }
}

impl FlagStore for WebStorageFlagStore {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.storage()?.get_item(key).map_err(map_js_error)
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.storage()?.set_item(key, value).map_err(map_js_error)
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        self.storage()?.remove_item(key).map_err(map_js_error)
    }
}

fn map_js_error(err: JsValue) -> AuthError {
    let message = stringify_js_error(err);
    log::warn!("web storage error: {message}");
    AuthError::Storage(message)
}

fn stringify_js_error(err: JsValue) -> String {
    if let Some(string) = err.as_string() {
        return string;
    }

    if let Ok(stringified) = js_sys::JSON::stringify(&err) {
        if let Some(text) = stringified.as_string() {
            return text;
        }
    }

    format!("{err:?}")
}
