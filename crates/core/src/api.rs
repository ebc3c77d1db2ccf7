//! Wire shapes shared by every REST endpoint.
//!
//! The storefront API wraps all responses in the same envelope:
//!
//! ```json
//! { "success": true, "data": { "items": [] } }
//! { "success": false, "error": "Coupon expired" }
//! ```

use serde::{Deserialize, Serialize};

/// Response envelope returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload on success.
    pub data: Option<T>,
    /// Machine-oriented error text on failure.
    pub error: Option<String>,
    /// Human-oriented message (some endpoints use this instead of `error`).
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Successful envelope around `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// Failed envelope carrying `error`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// The best available description of a failure.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Payload shape for collection endpoints (`/cart`, `/wishlist`).
///
/// The server always returns the whole collection; clients replace their
/// local copy wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPayload<E> {
    pub items: Vec<E>,
}

impl<E> CollectionPayload<E> {
    #[must_use]
    pub const fn new(items: Vec<E>) -> Self {
        Self { items }
    }
}

impl<E> Default for CollectionPayload<E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

/// Marker payload for endpoints that return no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_failure_prefers_error_over_message() {
        let json = r#"{"success":false,"error":"out_of_stock","message":"Item is sold out"}"#;
        let env: ApiEnvelope<Empty> = serde_json::from_str(json).unwrap();
        assert!(!env.success);
        assert_eq!(env.error_text(), Some("out_of_stock"));
    }

    #[test]
    fn test_envelope_failure_falls_back_to_message() {
        let json = r#"{"success":false,"message":"Please log in"}"#;
        let env: ApiEnvelope<Empty> = serde_json::from_str(json).unwrap();
        assert_eq!(env.error_text(), Some("Please log in"));
        assert!(env.data.is_none());
    }

    #[test]
    fn test_collection_payload_shape() {
        let payload: CollectionPayload<u32> = serde_json::from_str(r#"{"items":[1,2]}"#).unwrap();
        assert_eq!(payload.items, vec![1, 2]);
    }
}
