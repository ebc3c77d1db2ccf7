//! Cart provider.
//!
//! Adds, removes, variant changes and clears go straight to the server
//! when signed in, and the returned cart replaces the local one. Quantity
//! changes are applied locally at once and pushed by the debounced sync.
//! Guests get the same operations against guest storage.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::instrument;

use storefront_sync_core::api::CollectionPayload;
use storefront_sync_core::cart::{
    AddToCart, CartError, CartItem, CartSummary, Coupon, PricingPolicy, apply_add, apply_quantity,
    total_quantity,
};
use storefront_sync_core::{CartItemId, ProductId, guest_id};

use crate::api::{ApiClient, segment};
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::notifications::NotificationCenter;
use crate::storage::{GuestSlot, LocalStore, keys};
use crate::sync::{MergeOutcome, SessionId, SyncedCollection};

/// `POST /cart/add` body.
#[derive(Debug, Serialize)]
struct AddBody<'a> {
    product_id: &'a ProductId,
    quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customization: Option<&'a serde_json::Value>,
}

/// `PUT /cart/update` body.
#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    item_id: &'a CartItemId,
    quantity: u32,
    variant: &'a serde_json::Value,
}

/// `POST /cart/coupon` body.
#[derive(Debug, Serialize)]
struct CouponBody<'a> {
    code: &'a str,
    subtotal: rust_decimal::Decimal,
}

/// Shopper's cart.
#[derive(Clone)]
pub struct CartProvider {
    inner: Arc<CartInner>,
}

struct CartInner {
    items: SyncedCollection<CartItem>,
    api: ApiClient,
    notifications: NotificationCenter,
    coupon_slot: GuestSlot<Option<Coupon>>,
    coupon: RwLock<Option<Coupon>>,
    pricing: PricingPolicy,
}

impl std::fmt::Debug for CartProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartProvider")
            .field("items", &self.inner.items)
            .field("coupon", &self.coupon().map(|c| c.code))
            .finish_non_exhaustive()
    }
}

impl CartProvider {
    #[must_use]
    pub fn new(
        items: SyncedCollection<CartItem>,
        api: ApiClient,
        notifications: NotificationCenter,
        store: Arc<dyn LocalStore>,
        pricing: PricingPolicy,
    ) -> Self {
        let coupon_slot = GuestSlot::new(store, keys::CART_COUPON);
        let coupon = RwLock::new(coupon_slot.load());
        Self {
            inner: Arc::new(CartInner {
                items,
                api,
                notifications,
                coupon_slot,
                coupon,
                pricing,
            }),
        }
    }

    /// The synchronized collection behind this cart.
    #[must_use]
    pub fn collection(&self) -> &SyncedCollection<CartItem> {
        &self.inner.items
    }

    pub async fn items(&self) -> Vec<CartItem> {
        self.inner.items.snapshot().await
    }

    /// Total units across all lines.
    pub async fn item_count(&self) -> u32 {
        total_quantity(&self.inner.items.snapshot().await)
    }

    pub async fn contains(&self, product_id: &ProductId) -> bool {
        self.inner
            .items
            .any(|item| item.product.id == *product_id)
            .await
    }

    #[must_use]
    pub fn coupon(&self) -> Option<Coupon> {
        self.inner
            .coupon
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Totals for the current cart and coupon.
    pub async fn summary(&self) -> CartSummary {
        let items = self.inner.items.snapshot().await;
        let coupon = self.coupon();
        CartSummary::compute(&items, coupon.as_ref(), &self.inner.pricing)
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.pricing
    }

    /// Add a product, merging into an existing line with the same variant.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for a zero quantity or a stock
    /// limit, or the server's error when signed in.
    #[instrument(skip(self, request), fields(product_id = %request.product.id))]
    pub async fn add(&self, request: AddToCart) -> Result<()> {
        let name = request.product.name.clone();
        self.try_add(request)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.add"))?;

        add_breadcrumb("cart", "Added item", Some(&[("product", name.as_str())]));
        self.inner.notifications.success(format!("{name} added to cart"));
        Ok(())
    }

    async fn try_add(&self, request: AddToCart) -> Result<()> {
        request.validate()?;

        if !self.inner.items.is_authenticated() {
            return self
                .inner
                .items
                .mutate(|items| {
                    apply_add(items, request, guest_id).map_err(ClientError::from)
                })
                .await;
        }

        self.inner.items.settle().await?;
        let body = AddBody {
            product_id: &request.product.id,
            quantity: request.quantity,
            variant: request.variant.as_ref(),
            customization: request.customization.as_ref(),
        };
        let payload: CollectionPayload<CartItem> = self.inner.api.post("cart/add", &body).await?;
        self.inner.items.replace(payload.items).await
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// Applied locally at once. Signed-in carts push the change after the
    /// debounce delay; guest carts write it to guest storage.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown line or a quantity
    /// above the line's stock limit.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, id: &CartItemId, quantity: u32) -> Result<()> {
        self.inner
            .items
            .mutate(|items| apply_quantity(items, id, quantity).map_err(ClientError::from))
            .await
            .inspect_err(|e| {
                self.inner
                    .notifications
                    .report_failure(e, "cart.update_quantity");
            })
    }

    /// Switch a line to another variant.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown line, or the
    /// server's error when signed in.
    #[instrument(skip(self, variant))]
    pub async fn update_variant(&self, id: &CartItemId, variant: serde_json::Value) -> Result<()> {
        self.try_update_variant(id, variant)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.update_variant"))
    }

    async fn try_update_variant(&self, id: &CartItemId, variant: serde_json::Value) -> Result<()> {
        let Some(line) = self.inner.items.find(id).await else {
            return Err(CartError::ItemNotFound.into());
        };

        if !self.inner.items.is_authenticated() {
            return self
                .inner
                .items
                .mutate(|items| {
                    let item = items
                        .iter_mut()
                        .find(|item| item.id == *id)
                        .ok_or(CartError::ItemNotFound)?;
                    item.variant = Some(variant);
                    Ok(())
                })
                .await;
        }

        self.inner.items.settle().await?;
        let body = UpdateBody {
            item_id: id,
            quantity: line.quantity,
            variant: &variant,
        };
        let payload: CollectionPayload<CartItem> = self.inner.api.put("cart/update", &body).await?;
        self.inner.items.replace(payload.items).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown guest line, or the
    /// server's error when signed in.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &CartItemId) -> Result<()> {
        self.try_remove(id)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.remove"))?;
        add_breadcrumb("cart", "Removed item", Some(&[("item_id", id.as_str())]));
        Ok(())
    }

    async fn try_remove(&self, id: &CartItemId) -> Result<()> {
        if !self.inner.items.is_authenticated() {
            return self
                .inner
                .items
                .mutate(|items| apply_quantity(items, id, 0).map_err(ClientError::from))
                .await;
        }

        self.inner.items.settle().await?;
        let path = format!("cart/remove/{}", segment(id.as_str()));
        let payload: CollectionPayload<CartItem> = self.inner.api.delete(&path).await?;
        self.inner.items.replace(payload.items).await
    }

    /// Empty the cart and drop any coupon.
    ///
    /// # Errors
    ///
    /// Returns the server's error when signed in.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.try_clear()
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.clear"))?;
        self.forget_coupon()?;
        Ok(())
    }

    async fn try_clear(&self) -> Result<()> {
        if !self.inner.items.is_authenticated() {
            return self.inner.items.replace(Vec::new()).await;
        }

        self.inner.items.settle().await?;
        let payload: CollectionPayload<CartItem> = self.inner.api.delete("cart/clear").await?;
        self.inner.items.replace(payload.items).await
    }

    /// Validate `code` against the current subtotal and apply it.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection (expired, unknown code), or
    /// `ClientError::Validation` if the cart is below the coupon's minimum.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<Coupon> {
        let coupon = self
            .try_apply_coupon(code)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.coupon"))?;
        self.inner
            .notifications
            .success(format!("Coupon {} applied", coupon.code));
        Ok(coupon)
    }

    async fn try_apply_coupon(&self, code: &str) -> Result<Coupon> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ClientError::Validation("Enter a coupon code".to_string()));
        }

        let subtotal = self.summary().await.subtotal;
        let coupon: Coupon = self
            .inner
            .api
            .post("cart/coupon", &CouponBody { code, subtotal })
            .await?;

        if let Some(min) = coupon.min_order
            && subtotal < min
        {
            return Err(ClientError::Validation(format!(
                "Add {} more to use this coupon",
                min - subtotal
            )));
        }

        self.inner.coupon_slot.save(&Some(coupon.clone()))?;
        *self
            .inner
            .coupon
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(coupon.clone());
        Ok(coupon)
    }

    /// Drop the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns the server's error when signed in.
    pub async fn remove_coupon(&self) -> Result<()> {
        if self.coupon().is_none() {
            return Ok(());
        }
        if self.inner.items.is_authenticated() {
            self.inner
                .api
                .send::<()>(reqwest::Method::DELETE, "cart/coupon", None)
                .await
                .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.coupon"))?;
        }
        self.forget_coupon()
    }

    fn forget_coupon(&self) -> Result<()> {
        *self
            .inner
            .coupon
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.coupon_slot.clear()?;
        Ok(())
    }

    /// Reload from the server, or from guest storage when signed out.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the fetch fails.
    pub async fn refresh(&self) -> Result<()> {
        self.inner
            .items
            .fetch()
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.fetch"))
    }

    /// Push any pending quantity change now.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the push fails.
    pub async fn flush(&self) -> Result<()> {
        self.inner
            .items
            .settle()
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "cart.sync"))
    }

    /// Reconcile with the account after sign-in.
    pub async fn begin_session(&self, session: SessionId) -> MergeOutcome {
        let outcome = self.inner.items.enter_session(session).await;
        if let MergeOutcome::Merged { items } = outcome {
            self.inner
                .notifications
                .info(format!("{items} item(s) from your visit were added to your cart"));
        }
        outcome
    }

    /// Return to an empty guest cart after sign-out.
    pub async fn end_session(&self) {
        self.inner.items.leave_session().await;
        if let Err(err) = self.forget_coupon() {
            err.report("cart.end_session");
        }
    }
}
