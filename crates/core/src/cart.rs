//! Cart domain types and the cart summary computation.
//!
//! # Summary
//!
//! ```text
//! subtotal = Σ unit_price × quantity
//! discount = coupon (percentage of subtotal, or fixed amount), capped at subtotal
//! tax      = (subtotal − discount) × tax_rate
//! shipping = 0 when (subtotal − discount) > free_shipping_threshold, else flat fee
//! total    = subtotal − discount + tax + shipping
//! ```
//!
//! Every amount is rounded to two decimal places.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CartItemId, CurrencyCode, ProductId, round_money};

// =============================================================================
// Items
// =============================================================================

/// The product a cart or wishlist line refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    /// URL slug of the product page.
    pub slug: String,
    /// Primary image URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line ID (server-issued, or `guest-…` while browsing as a guest).
    pub id: CartItemId,
    pub product: ProductRef,
    pub quantity: u32,
    /// Price per unit after any product-level discount.
    pub unit_price: Decimal,
    /// Price per unit before the product-level discount, when discounted.
    #[serde(default)]
    pub original_price: Option<Decimal>,
    /// Selected variant (size, color, ...). Opaque to the client.
    #[serde(default)]
    pub variant: Option<serde_json::Value>,
    /// Customization blob (engraving text, gift wrap, ...). Opaque to the client.
    #[serde(default)]
    pub customization: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    /// Maximum purchasable quantity, when the server limits it.
    #[serde(default)]
    pub max_quantity: Option<u32>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

impl CartItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Savings on this line relative to the original price.
    #[must_use]
    pub fn line_savings(&self) -> Decimal {
        self.original_price
            .filter(|original| *original > self.unit_price)
            .map_or(Decimal::ZERO, |original| {
                (original - self.unit_price) * Decimal::from(self.quantity)
            })
    }

    /// Whether this line holds `product_id` with the same variant selection.
    #[must_use]
    pub fn same_line(&self, product_id: &ProductId, variant: Option<&serde_json::Value>) -> bool {
        self.product.id == *product_id && self.variant.as_ref() == variant
    }
}

/// Request body for `POST /cart/add`, also used to build guest lines locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddToCart {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub variant: Option<serde_json::Value>,
    #[serde(default)]
    pub customization: Option<serde_json::Value>,
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

/// Validation failures for cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("only {max} of this item can be ordered")]
    ExceedsStock { max: u32 },
    #[error("item is out of stock")]
    OutOfStock,
    #[error("item not found in cart")]
    ItemNotFound,
}

impl AddToCart {
    /// Validate the request before it touches any state.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] for a zero quantity and
    /// [`CartError::ExceedsStock`] when the quantity exceeds `max_quantity`.
    pub fn validate(&self) -> Result<(), CartError> {
        if self.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if let Some(max) = self.max_quantity
            && self.quantity > max
        {
            return Err(CartError::ExceedsStock { max });
        }
        Ok(())
    }

    /// Turn the request into a cart line with the given ID.
    #[must_use]
    pub fn into_item(self, id: CartItemId) -> CartItem {
        CartItem {
            id,
            product: self.product,
            quantity: self.quantity,
            unit_price: self.unit_price,
            original_price: self.original_price,
            variant: self.variant,
            customization: self.customization,
            in_stock: true,
            max_quantity: self.max_quantity,
            added_at: Some(Utc::now()),
        }
    }
}

/// Merge an add request into a local item list.
///
/// Adds to the quantity of a matching line (same product and variant) or
/// appends a new one. Used for guest carts; authenticated carts let the
/// server do this.
///
/// # Errors
///
/// Returns a [`CartError`] if the request is invalid or the combined
/// quantity exceeds the stock limit.
pub fn apply_add(
    items: &mut Vec<CartItem>,
    request: AddToCart,
    new_id: impl FnOnce() -> CartItemId,
) -> Result<(), CartError> {
    request.validate()?;

    if let Some(existing) = items
        .iter_mut()
        .find(|item| item.same_line(&request.product.id, request.variant.as_ref()))
    {
        if !existing.in_stock {
            return Err(CartError::OutOfStock);
        }
        let combined = existing.quantity.saturating_add(request.quantity);
        if let Some(max) = existing.max_quantity.or(request.max_quantity)
            && combined > max
        {
            return Err(CartError::ExceedsStock { max });
        }
        existing.quantity = combined;
        return Ok(());
    }

    items.push(request.into_item(new_id()));
    Ok(())
}

/// Set the quantity of a line; zero removes it.
///
/// # Errors
///
/// Returns [`CartError::ItemNotFound`] for an unknown line and
/// [`CartError::ExceedsStock`] when the quantity exceeds the line's limit.
pub fn apply_quantity(
    items: &mut Vec<CartItem>,
    id: &CartItemId,
    quantity: u32,
) -> Result<(), CartError> {
    let position = items
        .iter()
        .position(|item| item.id == *id)
        .ok_or(CartError::ItemNotFound)?;

    if quantity == 0 {
        items.remove(position);
        return Ok(());
    }

    if let Some(item) = items.get_mut(position) {
        if let Some(max) = item.max_quantity
            && quantity > max
        {
            return Err(CartError::ExceedsStock { max });
        }
        item.quantity = quantity;
    }
    Ok(())
}

// =============================================================================
// Coupons
// =============================================================================

/// How a coupon reduces the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponValue {
    /// Percentage of the subtotal (e.g., `10` for 10% off).
    Percentage(Decimal),
    /// Fixed amount off.
    Fixed(Decimal),
}

/// A coupon accepted by `POST /cart/coupon`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub value: CouponValue,
    /// Minimum subtotal for the coupon to apply.
    #[serde(default)]
    pub min_order: Option<Decimal>,
    /// Upper bound on the discount for percentage coupons.
    #[serde(default)]
    pub max_discount: Option<Decimal>,
}

impl Coupon {
    /// Discount this coupon grants on `subtotal`, never more than `subtotal`.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if self.min_order.is_some_and(|min| subtotal < min) {
            return Decimal::ZERO;
        }
        let raw = match self.value {
            CouponValue::Percentage(percent) => subtotal * percent / Decimal::ONE_HUNDRED,
            CouponValue::Fixed(amount) => amount,
        };
        let capped = self.max_discount.map_or(raw, |max| raw.min(max));
        capped.clamp(Decimal::ZERO, subtotal)
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Units across all lines, saturating at `u32::MAX`.
#[must_use]
pub fn total_quantity(items: &[CartItem]) -> u32 {
    items
        .iter()
        .fold(0u32, |total, item| total.saturating_add(item.quantity))
}

/// Tax and shipping rules applied to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax as a fraction (0.18 for 18% GST).
    pub tax_rate: Decimal,
    /// Orders above this amount (after discount) ship free.
    pub free_shipping_threshold: Decimal,
    /// Shipping charged below the threshold.
    pub shipping_fee: Decimal,
    pub currency: CurrencyCode,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            free_shipping_threshold: Decimal::from(999),
            shipping_fee: Decimal::from(50),
            currency: CurrencyCode::INR,
        }
    }
}

/// Totals displayed on the cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Product-level savings against original prices (informational).
    pub savings: Decimal,
    pub currency: CurrencyCode,
}

impl CartSummary {
    /// Compute the summary for `items` under `policy`, with an optional coupon.
    #[must_use]
    pub fn compute(items: &[CartItem], coupon: Option<&Coupon>, policy: &PricingPolicy) -> Self {
        let item_count = total_quantity(items);
        let subtotal = round_money(items.iter().map(CartItem::line_total).sum());
        let savings = round_money(items.iter().map(CartItem::line_savings).sum());
        let discount = round_money(coupon.map_or(Decimal::ZERO, |c| c.discount_for(subtotal)));

        let taxable = subtotal - discount;
        let tax = round_money(taxable * policy.tax_rate);
        let shipping = if items.is_empty() || taxable > policy.free_shipping_threshold {
            Decimal::ZERO
        } else {
            policy.shipping_fee
        };
        let total = subtotal - discount + tax + shipping;

        Self {
            item_count,
            subtotal,
            discount,
            tax,
            shipping,
            total,
            savings,
            currency: policy.currency,
        }
    }

    /// Amount still needed to qualify for free shipping, if any.
    #[must_use]
    pub fn remaining_for_free_shipping(&self, policy: &PricingPolicy) -> Option<Decimal> {
        let taxable = self.subtotal - self.discount;
        (self.item_count > 0 && taxable <= policy.free_shipping_threshold)
            .then(|| policy.free_shipping_threshold - taxable + Decimal::new(1, 2))
    }
}
