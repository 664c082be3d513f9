//! UI preferences.
//!
//! Only the theme survives restarts. Panel visibility is session state and
//! is reset to its defaults on every start.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::storage::{load_record, record_key, save_record, DurableStore};

/// Concern name used in the record key.
pub const PREFERENCES_CONCERN: &str = "ui-preferences";

/// Color theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark theme (default).
    #[default]
    Dark,
    /// Light theme.
    Light,
}

impl Theme {
    /// The other theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    /// Parses a string into a `Theme`, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

/// Full in-memory UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiState {
    /// Current theme.
    pub theme: Theme,
    /// Whether the module sidebar is shown.
    pub sidebar_open: bool,
    /// Whether the execution output panel is shown.
    pub output_panel_open: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            sidebar_open: true,
            output_panel_open: true,
        }
    }
}

/// The subset of [`UiState`] that is written to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedUiPreferences {
    /// Saved theme.
    #[serde(default)]
    pub theme: Theme,
}

impl From<&UiState> for PersistedUiPreferences {
    fn from(state: &UiState) -> Self {
        Self { theme: state.theme }
    }
}

impl PersistedUiPreferences {
    /// Applies the saved subset over defaults.
    #[must_use]
    pub fn restore(self) -> UiState {
        UiState {
            theme: self.theme,
            ..UiState::default()
        }
    }
}

/// UI preferences with persistence of the theme.
pub struct PreferencesStore {
    state: UiState,
    storage: Arc<dyn DurableStore>,
    key: String,
}

impl std::fmt::Debug for PreferencesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesStore")
            .field("state", &self.state)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PreferencesStore {
    /// Loads preferences stored under `<namespace>-ui-preferences`.
    #[must_use]
    pub fn load(storage: Arc<dyn DurableStore>, namespace: &str) -> Self {
        let key = record_key(namespace, PREFERENCES_CONCERN);
        let state = load_record::<PersistedUiPreferences>(storage.as_ref(), &key)
            .unwrap_or_default()
            .restore();
        debug!(key = %key, theme = %state.theme, "Preferences loaded");
        Self {
            state,
            storage,
            key,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> UiState {
        self.state
    }

    /// Sets the theme.
    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.update(|s| s.theme = theme)
    }

    /// Switches between dark and light.
    pub fn toggle_theme(&mut self) -> Result<()> {
        self.update(|s| s.theme = s.theme.toggled())
    }

    /// Shows or hides the sidebar.
    pub fn toggle_sidebar(&mut self) -> Result<()> {
        self.update(|s| s.sidebar_open = !s.sidebar_open)
    }

    /// Shows or hides the output panel.
    pub fn toggle_output_panel(&mut self) -> Result<()> {
        self.update(|s| s.output_panel_open = !s.output_panel_open)
    }

    /// Sets sidebar visibility.
    pub fn set_sidebar_open(&mut self, open: bool) -> Result<()> {
        self.update(|s| s.sidebar_open = open)
    }

    /// Sets output panel visibility.
    pub fn set_output_panel_open(&mut self, open: bool) -> Result<()> {
        self.update(|s| s.output_panel_open = open)
    }

    // Every write persists the projection, even when only session fields changed.
    fn update(&mut self, change: impl FnOnce(&mut UiState)) -> Result<()> {
        change(&mut self.state);
        let persisted = PersistedUiPreferences::from(&self.state);
        save_record(self.storage.as_ref(), &self.key, &persisted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_defaults() {
        let store = PreferencesStore::load(Arc::new(MemoryStore::new()), "academy");
        assert_eq!(store.state(), UiState::default());
        assert_eq!(store.state().theme, Theme::Dark);
        assert!(store.state().sidebar_open);
        assert!(store.state().output_panel_open);
    }

    #[test]
    fn test_only_theme_is_persisted() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = PreferencesStore::load(storage.clone(), "academy");
        store.set_theme(Theme::Light).unwrap();
        store.toggle_sidebar().unwrap();
        store.set_output_panel_open(false).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&storage.raw("academy-ui-preferences").unwrap()).unwrap();
        assert_eq!(raw["state"], serde_json::json!({"theme": "light"}));

        let reloaded = PreferencesStore::load(storage, "academy");
        assert_eq!(reloaded.state().theme, Theme::Light);
        assert!(reloaded.state().sidebar_open);
        assert!(reloaded.state().output_panel_open);
    }

    #[test]
    fn test_toggles() {
        let mut store = PreferencesStore::load(Arc::new(MemoryStore::new()), "academy");
        store.toggle_theme().unwrap();
        assert_eq!(store.state().theme, Theme::Light);
        store.toggle_theme().unwrap();
        assert_eq!(store.state().theme, Theme::Dark);

        store.toggle_output_panel().unwrap();
        assert!(!store.state().output_panel_open);
        store.set_sidebar_open(false).unwrap();
        assert!(!store.state().sidebar_open);
    }

    #[test]
    fn test_theme_parsing() {
        assert_eq!(Theme::from_str_case_insensitive("LIGHT"), Some(Theme::Light));
        assert_eq!(Theme::from_str_case_insensitive("sepia"), None);
    }
}
