//! Wishlist domain types.
//!
//! A wishlist item stores a snapshot of the product taken when it was saved,
//! plus the shopper's alert preferences. The server refreshes snapshots on
//! every round-trip; in guest mode they are whatever was saved.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{AddToCart, ProductRef};
use crate::types::{ProductId, WishlistItemId};

/// Product data captured when the item was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(flatten)]
    pub product: ProductRef,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
}

const fn default_true() -> bool {
    true
}

/// Shopper notification preferences for a wishlist item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPreferences {
    /// Notify when the price drops to or below this amount.
    #[serde(default)]
    pub target_price: Option<Decimal>,
    /// Notify when an out-of-stock item is back.
    #[serde(default)]
    pub restock_alert: bool,
}

/// One saved product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub snapshot: ProductSnapshot,
    #[serde(default)]
    pub alerts: AlertPreferences,
    #[serde(default)]
    pub note: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl WishlistItem {
    /// Create a new item from a snapshot.
    #[must_use]
    pub fn new(id: WishlistItemId, snapshot: ProductSnapshot) -> Self {
        Self {
            id,
            snapshot,
            alerts: AlertPreferences::default(),
            note: None,
            added_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.snapshot.product.id
    }

    /// Whether the current price has reached the shopper's target.
    #[must_use]
    pub fn price_target_reached(&self) -> bool {
        self.alerts
            .target_price
            .is_some_and(|target| self.snapshot.price <= target)
    }

    /// Whether a restock alert should fire given the previous snapshot.
    #[must_use]
    pub fn restocked_since(&self, previous: &ProductSnapshot) -> bool {
        self.alerts.restock_alert && !previous.in_stock && self.snapshot.in_stock
    }

    /// Build a cart request for this item.
    #[must_use]
    pub fn to_cart_request(&self, quantity: u32) -> AddToCart {
        AddToCart {
            product: self.snapshot.product.clone(),
            quantity,
            unit_price: self.snapshot.price,
            original_price: self.snapshot.original_price,
            variant: None,
            customization: None,
            max_quantity: None,
        }
    }
}

/// Alerts raised by comparing a refreshed wishlist against the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistAlert {
    PriceDrop {
        product: String,
        price: Decimal,
        target: Decimal,
    },
    BackInStock {
        product: String,
    },
}

/// Compare a refreshed wishlist against the previous copy and collect alerts.
///
/// A price alert fires only when the target is newly reached, so repeated
/// refreshes at the same low price stay quiet.
#[must_use]
pub fn detect_alerts(previous: &[WishlistItem], current: &[WishlistItem]) -> Vec<WishlistAlert> {
    current
        .iter()
        .filter_map(|item| {
            let before = previous.iter().find(|p| p.product_id() == item.product_id())?;
            let name = item.snapshot.product.name.clone();
            if item.restocked_since(&before.snapshot) {
                return Some(WishlistAlert::BackInStock { product: name });
            }
            if item.price_target_reached() && !before.price_target_reached() {
                return Some(WishlistAlert::PriceDrop {
                    product: name,
                    price: item.snapshot.price,
                    target: item.alerts.target_price.unwrap_or(item.snapshot.price),
                });
            }
            None
        })
        .collect()
}
