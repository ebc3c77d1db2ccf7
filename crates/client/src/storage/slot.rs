//! Typed handle onto a single storage key.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{LocalStore, StorageError};

/// A typed value persisted under a fixed key, with a default.
///
/// Missing or unreadable values load as `T::default()`. There is no
/// versioning: a value that no longer matches `T` is discarded with a
/// warning.
pub struct GuestSlot<T> {
    store: Arc<dyn LocalStore>,
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for GuestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for GuestSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestSlot").field("key", &self.key).finish()
    }
}

impl<T> GuestSlot<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, key: &'static str) -> Self {
        Self {
            store,
            key,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Load the stored value, or the default.
    #[must_use]
    pub fn load(&self) -> T {
        match self.store.get(self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(key = self.key, error = %e, "Discarding unreadable local value");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "Local storage read failed");
                T::default()
            }
        }
    }

    /// Persist `value`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or writing fails.
    pub fn save(&self, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(self.key, &raw)
    }

    /// Delete the stored value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(self.key)
    }

    /// Whether a value is currently stored.
    #[must_use]
    pub fn exists(&self) -> bool {
        matches!(self.store.get(self.key), Ok(Some(_)))
    }
}
