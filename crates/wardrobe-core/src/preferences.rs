//! Locally persisted user preferences.
//!
//! Stored as JSON under a single key of the injected `KeyValueStore`, so
//! tests can run against `MemoryStore` while the CLI uses the keychain.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::auth::KeyValueStore;
use crate::models::UserPreferences;

const PREFERENCES_KEY: &str = "user_preferences";

#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored preferences, or defaults when nothing has been saved yet.
    pub fn load(&self) -> Result<UserPreferences> {
        match self.store.get(PREFERENCES_KEY)? {
            Some(json) => serde_json::from_str(&json).context("Failed to parse stored preferences"),
            None => Ok(UserPreferences::default()),
        }
    }

    pub fn save(&self, preferences: &UserPreferences) -> Result<()> {
        let json = serde_json::to_string(preferences)?;
        self.store
            .set(PREFERENCES_KEY, &json)
            .context("Failed to save preferences")
    }

    /// Style text to send with schedule generation; `None` when blank.
    pub fn style_preferences(&self) -> Result<Option<String>> {
        let text = self.load()?.style_preferences;
        let trimmed = text.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(PREFERENCES_KEY)
    }
}
