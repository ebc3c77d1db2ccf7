//! Unified error handling with Sentry integration.
//!
//! Every provider operation returns `Result<T, ClientError>`. Nothing is
//! retried; the error is reported once (server-class errors go to Sentry)
//! and surfaced to the shopper through [`ClientError::user_message`].

use thiserror::Error;

use storefront_sync_core::cart::CartError;
use storefront_sync_core::theme::ThemeError;
use storefront_sync_core::user::CredentialError;

use crate::crypto::CryptoError;
use crate::storage::StorageError;

/// Broad classes of failure, used to pick the toast shown to the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request never got a response.
    Network,
    /// The server rejected the request (4xx).
    Client,
    /// The server failed (5xx or an unreadable response).
    Server,
    /// Input rejected before any request was made.
    Validation,
    /// Local storage or cache failure.
    Local,
}

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The session token is missing, expired or rejected (401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server rejected the request (4xx other than 401).
    #[error("Request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    /// The server failed to handle the request (5xx).
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("Unexpected response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Input validation failed before any request was made.
    #[error("{0}")]
    Validation(String),

    /// An operation needing a session was called in guest mode.
    #[error("Not signed in")]
    NotAuthenticated,

    /// Guest-local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The encrypted cache could not be read or written.
    #[error("Cache encryption error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<CartError> for ClientError {
    fn from(err: CartError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CredentialError> for ClientError {
    fn from(err: CredentialError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ThemeError> for ClientError {
    fn from(err: ThemeError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ClientError {
    /// Classify the error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) => ErrorCategory::Network,
            Self::Unauthorized(_) | Self::Client { .. } | Self::NotAuthenticated => {
                ErrorCategory::Client
            }
            Self::Server { .. } | Self::Parse(_) => ErrorCategory::Server,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Storage(_) | Self::Crypto(_) => ErrorCategory::Local,
        }
    }

    /// Text suitable for a toast or inline form error.
    ///
    /// Client errors show the server's message; server and network errors
    /// show a generic message so internal details never reach the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Unable to reach the store. Check your connection.".to_string(),
            Self::Unauthorized(_) | Self::NotAuthenticated => {
                "Please sign in to continue.".to_string()
            }
            Self::Client { message, .. } | Self::Validation(message) => message.clone(),
            Self::Server { .. } | Self::Parse(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
            Self::Storage(_) | Self::Crypto(_) => "Could not save your changes locally.".to_string(),
        }
    }

    /// Whether this error should be captured to Sentry.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Server | ErrorCategory::Local
        )
    }

    /// Capture server-class errors to Sentry and log everything else.
    pub fn report(&self, operation: &str) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                operation,
                sentry_event_id = %event_id,
                "Storefront operation failed"
            );
        } else {
            tracing::warn!(error = %self, operation, "Storefront operation rejected");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context after sign-in.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a shopper action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "p_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
