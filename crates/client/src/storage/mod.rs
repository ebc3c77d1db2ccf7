//! Guest-local persistence.
//!
//! The storefront keeps a local mirror of guest collections, the session
//! token and a few preferences. [`LocalStore`] is the raw key/value seam;
//! [`GuestSlot`] is the typed handle everything else uses.
//!
//! # Implementations
//!
//! - [`FileStore`] - One JSON file per key under a data directory
//! - [`MemoryStore`] - Process-local map, for tests and ephemeral sessions

mod file;
mod memory;
mod slot;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use slot::GuestSlot;

use thiserror::Error;

/// Errors raised by local storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Key contains characters not allowed in a storage key.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Raw string key/value storage.
///
/// Values are opaque strings (JSON in practice). Missing keys read as `None`.
pub trait LocalStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Reject keys that would escape the storage namespace.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Storage keys used by the client.
pub mod keys {
    /// Guest cart items.
    pub const GUEST_CART: &str = "guest_cart";

    /// Guest wishlist items.
    pub const GUEST_WISHLIST: &str = "guest_wishlist";

    /// Bearer token for the current session (the cookie analog).
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Encrypted mirror of the signed-in user.
    pub const USER_CACHE: &str = "user_cache";

    /// Coupon applied to the cart.
    pub const CART_COUPON: &str = "cart_coupon";

    /// Saved theme settings.
    pub const THEME: &str = "theme";
}
