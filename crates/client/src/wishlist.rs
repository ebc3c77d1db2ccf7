//! Wishlist provider.
//!
//! Same sync rules as the cart: adds, removes, note edits and clears go to
//! the server directly when signed in, alert preference toggles are pushed
//! by the debounced sync, and guests work against guest storage. Refreshing
//! compares the new copy against the old one and raises price-drop and
//! restock notifications.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use storefront_sync_core::api::CollectionPayload;
use storefront_sync_core::notification::{Channel, Notification, NotificationKind};
use storefront_sync_core::wishlist::{
    AlertPreferences, ProductSnapshot, WishlistAlert, WishlistItem, detect_alerts,
};
use storefront_sync_core::{ProductId, WishlistItemId, guest_id};

use crate::api::{ApiClient, segment};
use crate::cart::CartProvider;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::notifications::NotificationCenter;
use crate::sync::{MergeOutcome, SessionId, SyncedCollection};

#[derive(Debug, Serialize)]
struct AddBody<'a> {
    product_id: &'a ProductId,
    alerts: AlertPreferences,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    item_id: &'a WishlistItemId,
    alerts: AlertPreferences,
    note: Option<&'a str>,
}

/// Shopper's wishlist.
#[derive(Clone)]
pub struct WishlistProvider {
    inner: Arc<WishlistInner>,
}

struct WishlistInner {
    items: SyncedCollection<WishlistItem>,
    api: ApiClient,
    notifications: NotificationCenter,
}

impl std::fmt::Debug for WishlistProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistProvider")
            .field("items", &self.inner.items)
            .finish_non_exhaustive()
    }
}

impl WishlistProvider {
    #[must_use]
    pub fn new(
        items: SyncedCollection<WishlistItem>,
        api: ApiClient,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            inner: Arc::new(WishlistInner {
                items,
                api,
                notifications,
            }),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &SyncedCollection<WishlistItem> {
        &self.inner.items
    }

    pub async fn items(&self) -> Vec<WishlistItem> {
        self.inner.items.snapshot().await
    }

    pub async fn len(&self) -> usize {
        self.inner.items.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.items.is_empty().await
    }

    pub async fn contains(&self, product_id: &ProductId) -> bool {
        self.inner
            .items
            .any(|item| item.product_id() == product_id)
            .await
    }

    async fn find_product(&self, product_id: &ProductId) -> Option<WishlistItem> {
        self.inner
            .items
            .snapshot()
            .await
            .into_iter()
            .find(|item| item.product_id() == product_id)
    }

    /// Save a product. Saving one that is already listed changes nothing.
    ///
    /// # Errors
    ///
    /// Returns the server's error when signed in, or a storage error for
    /// guests.
    #[instrument(skip(self, snapshot, alerts), fields(product_id = %snapshot.product.id))]
    pub async fn add(&self, snapshot: ProductSnapshot, alerts: AlertPreferences) -> Result<()> {
        if self.contains(&snapshot.product.id).await {
            self.inner
                .notifications
                .info(format!("{} is already in your wishlist", snapshot.product.name));
            return Ok(());
        }

        let name = snapshot.product.name.clone();
        self.try_add(snapshot, alerts)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "wishlist.add"))?;

        add_breadcrumb("wishlist", "Saved item", Some(&[("product", name.as_str())]));
        self.inner
            .notifications
            .success(format!("{name} saved to your wishlist"));
        Ok(())
    }

    async fn try_add(&self, snapshot: ProductSnapshot, alerts: AlertPreferences) -> Result<()> {
        if !self.inner.items.is_authenticated() {
            return self
                .inner
                .items
                .mutate(|items| {
                    let mut item = WishlistItem::new(guest_id(), snapshot);
                    item.alerts = alerts;
                    items.push(item);
                    Ok(())
                })
                .await;
        }

        self.inner.items.settle().await?;
        let body = AddBody {
            product_id: &snapshot.product.id,
            alerts,
        };
        let payload: CollectionPayload<WishlistItem> =
            self.inner.api.post("wishlist/add", &body).await?;
        self.inner.items.replace(payload.items).await
    }

    /// Remove the product if saved, otherwise save it. Returns whether it is
    /// now saved.
    ///
    /// # Errors
    ///
    /// See [`WishlistProvider::add`] and [`WishlistProvider::remove`].
    pub async fn toggle(&self, snapshot: ProductSnapshot) -> Result<bool> {
        match self.find_product(&snapshot.product.id).await {
            Some(existing) => {
                self.remove(&existing.id).await?;
                Ok(false)
            }
            None => {
                self.add(snapshot, AlertPreferences::default()).await?;
                Ok(true)
            }
        }
    }

    /// Remove an entry.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown entry, or the
    /// server's error when signed in.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &WishlistItemId) -> Result<()> {
        self.try_remove(id)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "wishlist.remove"))
    }

    async fn try_remove(&self, id: &WishlistItemId) -> Result<()> {
        if !self.inner.items.is_authenticated() {
            return self
                .inner
                .items
                .mutate(|items| {
                    let before = items.len();
                    items.retain(|item| item.id != *id);
                    if items.len() == before {
                        return Err(not_found());
                    }
                    Ok(())
                })
                .await;
        }

        self.inner.items.settle().await?;
        let path = format!("wishlist/remove/{}", segment(id.as_str()));
        let payload: CollectionPayload<WishlistItem> = self.inner.api.delete(&path).await?;
        self.inner.items.replace(payload.items).await
    }

    /// Change price and restock alerts for an entry.
    ///
    /// Applied locally at once and pushed after the debounce delay.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown entry.
    #[instrument(skip(self))]
    pub async fn update_alerts(&self, id: &WishlistItemId, alerts: AlertPreferences) -> Result<()> {
        self.inner
            .items
            .mutate(|items| {
                let item = items
                    .iter_mut()
                    .find(|item| item.id == *id)
                    .ok_or_else(not_found)?;
                item.alerts = alerts;
                Ok(())
            })
            .await
            .inspect_err(|e| {
                self.inner
                    .notifications
                    .report_failure(e, "wishlist.update_alerts");
            })
    }

    /// Set or clear the private note on an entry.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown entry, or the
    /// server's error when signed in.
    #[instrument(skip(self, note))]
    pub async fn update_note(&self, id: &WishlistItemId, note: Option<String>) -> Result<()> {
        self.try_update_note(id, note)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "wishlist.update_note"))
    }

    async fn try_update_note(&self, id: &WishlistItemId, note: Option<String>) -> Result<()> {
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        if !self.inner.items.is_authenticated() {
            return self
                .inner
                .items
                .mutate(|items| {
                    let item = items
                        .iter_mut()
                        .find(|item| item.id == *id)
                        .ok_or_else(not_found)?;
                    item.note = note;
                    Ok(())
                })
                .await;
        }

        let Some(current) = self.inner.items.find(id).await else {
            return Err(not_found());
        };
        self.inner.items.settle().await?;
        let body = UpdateBody {
            item_id: id,
            alerts: current.alerts,
            note: note.as_deref(),
        };
        let payload: CollectionPayload<WishlistItem> =
            self.inner.api.put("wishlist/update", &body).await?;
        self.inner.items.replace(payload.items).await
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns the server's error when signed in.
    pub async fn clear(&self) -> Result<()> {
        self.try_clear()
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "wishlist.clear"))
    }

    async fn try_clear(&self) -> Result<()> {
        if !self.inner.items.is_authenticated() {
            return self.inner.items.replace(Vec::new()).await;
        }

        self.inner.items.settle().await?;
        let payload: CollectionPayload<WishlistItem> =
            self.inner.api.delete("wishlist/clear").await?;
        self.inner.items.replace(payload.items).await
    }

    /// Add an entry to `cart`, then remove it from the wishlist.
    ///
    /// The entry stays saved if the cart rejects it.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an unknown or out-of-stock
    /// entry, or whatever the cart or the removal returns.
    #[instrument(skip(self, cart))]
    pub async fn move_to_cart(
        &self,
        id: &WishlistItemId,
        quantity: u32,
        cart: &CartProvider,
    ) -> Result<()> {
        let Some(item) = self.inner.items.find(id).await else {
            let err = not_found();
            self.inner
                .notifications
                .report_failure(&err, "wishlist.move_to_cart");
            return Err(err);
        };
        if !item.snapshot.in_stock {
            let err = ClientError::Validation(format!(
                "{} is out of stock",
                item.snapshot.product.name
            ));
            self.inner
                .notifications
                .report_failure(&err, "wishlist.move_to_cart");
            return Err(err);
        }

        cart.add(item.to_cart_request(quantity)).await?;
        self.remove(id).await
    }

    /// Reload and report alerts raised since the previous copy.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<WishlistAlert>> {
        let previous = self.inner.items.snapshot().await;
        self.inner
            .items
            .fetch()
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "wishlist.fetch"))?;
        let current = self.inner.items.snapshot().await;

        let alerts = detect_alerts(&previous, &current);
        for alert in &alerts {
            // Shown locally even when the inbox write fails
            if let Err(err) = self.inner.notifications.push(alert_notification(alert)).await {
                warn!(error = %err, "Wishlist alert not saved to inbox");
            }
        }
        if !alerts.is_empty() {
            info!(alerts = alerts.len(), "Wishlist alerts raised");
        }
        Ok(alerts)
    }

    /// Push any pending alert change now.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the push fails.
    pub async fn flush(&self) -> Result<()> {
        self.inner
            .items
            .settle()
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "wishlist.sync"))
    }

    /// Reconcile with the account after sign-in.
    pub async fn begin_session(&self, session: SessionId) -> MergeOutcome {
        self.inner.items.enter_session(session).await
    }

    /// Return to an empty guest wishlist after sign-out.
    pub async fn end_session(&self) {
        self.inner.items.leave_session().await;
    }
}

fn not_found() -> ClientError {
    ClientError::Validation("Wishlist item not found".to_string())
}

fn alert_notification(alert: &WishlistAlert) -> Notification {
    match alert {
        WishlistAlert::PriceDrop {
            product,
            price,
            target,
        } => Notification::new(
            NotificationKind::Success,
            format!("{product} is now {price}, at or below your target of {target}"),
        )
        .with_title("Price drop"),
        WishlistAlert::BackInStock { product } => {
            Notification::new(NotificationKind::Info, format!("{product} is back in stock"))
                .with_title("Back in stock")
        }
    }
    .with_channel(Channel::Both)
}
