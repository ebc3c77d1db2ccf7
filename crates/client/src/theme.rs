//! Saved theme settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use storefront_sync_core::theme::{ThemeSettings, css_variables, to_css};

use crate::error::Result;
use crate::storage::{GuestSlot, LocalStore, keys};

/// Theme settings persisted in local storage.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    slot: GuestSlot<ThemeSettings>,
}

impl ThemeStore {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            slot: GuestSlot::new(store, keys::THEME),
        }
    }

    /// Saved settings, or the defaults.
    #[must_use]
    pub fn load(&self) -> ThemeSettings {
        self.slot.load()
    }

    /// Validate and save `settings`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an invalid color or font scale
    /// (nothing is saved), or `ClientError::Storage` if writing fails.
    pub fn save(&self, settings: &ThemeSettings) -> Result<()> {
        css_variables(settings)?;
        self.slot.save(settings)?;
        Ok(())
    }

    /// Apply `edit` to the saved settings and save the result.
    ///
    /// # Errors
    ///
    /// See [`ThemeStore::save`].
    pub fn update(&self, edit: impl FnOnce(&mut ThemeSettings)) -> Result<ThemeSettings> {
        let mut settings = self.load();
        edit(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }

    /// Forget saved settings.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the backend cannot be written.
    pub fn reset(&self) -> Result<()> {
        self.slot.clear()?;
        Ok(())
    }

    /// CSS custom properties for the saved settings.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if the stored settings are invalid.
    pub fn variables(&self) -> Result<BTreeMap<String, String>> {
        Ok(css_variables(&self.load())?)
    }

    /// `:root { ... }` block for the saved settings.
    ///
    /// # Errors
    ///
    /// See [`ThemeStore::variables`].
    pub fn css(&self) -> Result<String> {
        Ok(to_css(&self.variables()?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storefront_sync_core::theme::ThemeMode;

    use super::*;
    use crate::error::ClientError;
    use crate::storage::MemoryStore;

    #[test]
    fn test_defaults_until_saved() {
        let themes = ThemeStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(themes.load(), ThemeSettings::default());
        assert!(themes.css().unwrap().starts_with(":root {"));
    }

    #[test]
    fn test_update_persists() {
        let store = Arc::new(MemoryStore::new());
        let themes = ThemeStore::new(store.clone());

        themes
            .update(|t| {
                t.mode = ThemeMode::Dark;
                t.primary_color = "#123456".to_string();
            })
            .unwrap();

        let reopened = ThemeStore::new(store);
        assert_eq!(reopened.load().mode, ThemeMode::Dark);
        assert_eq!(
            reopened.variables().unwrap()["--color-primary"],
            "#123456"
        );
    }

    #[test]
    fn test_invalid_color_is_not_saved() {
        let store = Arc::new(MemoryStore::new());
        let themes = ThemeStore::new(store.clone());

        let err = themes
            .update(|t| t.accent_color = "chartreuse".to_string())
            .unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert!(!store.contains(keys::THEME));
    }
}
