use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Configuration handed to the auth SDK when starting a popup or redirect.
///
/// Holds the provider identifier plus the scopes, custom query parameters and
/// language hint applied to the provider's consent screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    provider_id: String,
    scopes: Vec<String>,
    custom_parameters: BTreeMap<String, String>,
    language_code: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            scopes: Vec::new(),
            custom_parameters: BTreeMap::new(),
            language_code: None,
        }
    }

    /// Google sign-in as the account page configures it: profile and email
    /// scopes, always showing the account chooser.
    pub fn google() -> Self {
        let mut config = Self::new(GOOGLE_PROVIDER_ID);
        config.add_scope("profile");
        config.add_scope("email");
        config.set_custom_parameter("prompt", "select_account");
        config
    }

    /// Returns the provider identifier (e.g. `google.com`).
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn custom_parameters(&self) -> &BTreeMap<String, String> {
        &self.custom_parameters
    }

    pub fn language_code(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    /// Adds a scope to the provider if it has not been added yet.
    pub fn add_scope(&mut self, scope: impl Into<String>) -> &mut Self {
        let value = scope.into();
        if !self.scopes.contains(&value) {
            self.scopes.push(value);
        }
        self
    }

    pub fn set_custom_parameter(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.custom_parameters.insert(key.into(), value.into());
        self
    }

    /// Sets the preferred language hint passed to the provider.
    pub fn set_language_code(&mut self, value: impl Into<String>) -> &mut Self {
        self.language_code = Some(value.into());
        self
    }

    /// Adds a `login_hint` so the chooser preselects a known account.
    pub fn set_login_hint(&mut self, hint: &str) -> &mut Self {
        self.set_custom_parameter("login_hint", hint)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::google()
    }
}
