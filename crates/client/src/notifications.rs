//! Notification center: in-app history, toast queue, server inbox.
//!
//! Every notification lands in a bounded history list. Those meant for a
//! toast also enter a bounded toast queue that a display loop drains one at
//! a time, pausing a fixed interval between toasts. Both lists drop their
//! oldest entry when full. Priority is recorded but never reorders either
//! list.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use storefront_sync_core::NotificationId;
use storefront_sync_core::api::CollectionPayload;
use storefront_sync_core::notification::{BoundedQueue, Notification, NotificationKind};

use crate::api::{ApiClient, segment};
use crate::error::{ClientError, Result, add_breadcrumb};

/// Where toasts are shown.
pub trait ToastSink: Send + Sync {
    fn show(&self, notification: &Notification);
}

/// Writes toasts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ToastSink for TracingSink {
    fn show(&self, notification: &Notification) {
        let title = notification.title.as_deref().unwrap_or_default();
        match notification.kind {
            NotificationKind::Error => {
                tracing::error!(title, message = %notification.message, "toast");
            }
            NotificationKind::Warning => {
                tracing::warn!(title, message = %notification.message, "toast");
            }
            NotificationKind::Info | NotificationKind::Success => {
                tracing::info!(title, message = %notification.message, "toast");
            }
        }
    }
}

/// Shared notification state.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

struct CenterInner {
    api: ApiClient,
    history: Mutex<BoundedQueue<Notification>>,
    toasts: Mutex<BoundedQueue<Notification>>,
    wake: Notify,
    toast_interval: Duration,
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("history", &self.inner.history().len())
            .field("pending_toasts", &self.inner.toasts().len())
            .finish_non_exhaustive()
    }
}

impl CenterInner {
    fn history(&self) -> MutexGuard<'_, BoundedQueue<Notification>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn toasts(&self) -> MutexGuard<'_, BoundedQueue<Notification>> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationCenter {
    /// Create a center holding at most `cap` notifications in each list.
    #[must_use]
    pub fn new(api: ApiClient, cap: usize, toast_interval: Duration) -> Self {
        Self {
            inner: Arc::new(CenterInner {
                api,
                history: Mutex::new(BoundedQueue::new(cap)),
                toasts: Mutex::new(BoundedQueue::new(cap)),
                wake: Notify::new(),
                toast_interval,
            }),
        }
    }

    /// Record a notification locally and queue its toast.
    pub fn notify(&self, notification: Notification) {
        if notification.channel.shows_toast() {
            if let Some(dropped) = self.inner.toasts().push(notification.clone()) {
                debug!(id = %dropped.id, "Toast queue full, dropped oldest");
            }
            self.inner.wake.notify_one();
        }
        self.inner.history().push(notification);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notification::success(message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notification::info(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notification::error(message));
    }

    /// Report a failed operation and show its shopper-facing message.
    pub fn report_failure(&self, err: &ClientError, operation: &str) {
        err.report(operation);
        self.error(err.user_message());
    }

    /// Record a notification and, if it targets the inbox, store it on the
    /// server too.
    ///
    /// The local copy is kept even if the server rejects it. Guests have no
    /// inbox, so nothing is sent without a session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the inbox request fails.
    #[instrument(skip(self, notification), fields(kind = ?notification.kind))]
    pub async fn push(&self, notification: Notification) -> Result<()> {
        let reaches_inbox = notification.channel.reaches_inbox();
        if !reaches_inbox || !self.inner.api.has_token() {
            self.notify(notification);
            return Ok(());
        }

        let local_id = notification.id.clone();
        self.notify(notification.clone());

        let stored: Notification = self
            .inner
            .api
            .post("notifications", &notification)
            .await
            .inspect_err(|e| e.report("notifications.push"))?;

        // Adopt the server's id so later read/delete calls address it.
        for entry in self.inner.history().iter_mut() {
            if entry.id == local_id {
                *entry = stored.clone();
            }
        }
        Ok(())
    }

    /// Newest first.
    #[must_use]
    pub fn list(&self) -> Vec<Notification> {
        self.inner.history().iter().rev().cloned().collect()
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.inner.history().iter().filter(|n| !n.read).count()
    }

    #[must_use]
    pub fn pending_toasts(&self) -> usize {
        self.inner.toasts().len()
    }

    /// Take the oldest queued toast.
    #[must_use]
    pub fn next_toast(&self) -> Option<Notification> {
        self.inner.toasts().pop()
    }

    /// Replace the history with the server inbox. Returns how many were kept.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the inbox cannot be fetched.
    #[instrument(skip(self))]
    pub async fn fetch_inbox(&self) -> Result<usize> {
        let payload: CollectionPayload<Notification> = self
            .inner
            .api
            .get("notifications")
            .await
            .inspect_err(|e| self.report_failure(e, "notifications.fetch"))?;

        let mut inbox = payload.items;
        inbox.sort_by_key(|n| n.created_at);
        let mut history = self.inner.history();
        history.replace(inbox);
        Ok(history.len())
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server rejects the change; the local
    /// flag stays set.
    pub async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        let mut found = false;
        for entry in self.inner.history().iter_mut().filter(|n| n.id == *id) {
            entry.read = true;
            found = true;
        }
        if !found {
            let err = ClientError::Validation("Notification not found".to_string());
            self.report_failure(&err, "notifications.read");
            return Err(err);
        }

        if self.inner.api.has_token() {
            let path = format!("notifications/{}/read", segment(id.as_str()));
            self.inner
                .api
                .send::<()>(Method::PUT, &path, None)
                .await
                .inspect_err(|e| self.report_failure(e, "notifications.read"))?;
        }
        Ok(())
    }

    /// Mark every notification read.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server rejects the change.
    pub async fn mark_all_read(&self) -> Result<()> {
        for entry in self.inner.history().iter_mut() {
            entry.read = true;
        }

        if self.inner.api.has_token() {
            self.inner
                .api
                .send::<()>(Method::PUT, "notifications/read-all", None)
                .await
                .inspect_err(|e| self.report_failure(e, "notifications.read_all"))?;
        }
        add_breadcrumb("notifications", "Marked all read", None);
        Ok(())
    }

    /// Delete one notification.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server rejects the deletion.
    pub async fn delete(&self, id: &NotificationId) -> Result<()> {
        let removed = self.inner.history().remove_where(|n| n.id == *id);
        self.inner.toasts().remove_where(|n| n.id == *id);

        if removed > 0 && self.inner.api.has_token() {
            let path = format!("notifications/{}", segment(id.as_str()));
            self.inner
                .api
                .send::<()>(Method::DELETE, &path, None)
                .await
                .inspect_err(|e| self.report_failure(e, "notifications.delete"))?;
        }
        Ok(())
    }

    /// Drop everything held locally.
    pub fn clear(&self) {
        self.inner.history().clear();
        self.inner.toasts().clear();
    }

    /// Spawn the loop that shows queued toasts on `sink`.
    ///
    /// Shows the oldest toast, waits the configured interval, repeats; sleeps
    /// until woken when the queue is empty. Runs until the handle is aborted.
    pub fn spawn_display_loop(&self, sink: Arc<dyn ToastSink>) -> JoinHandle<()> {
        let center = self.clone();
        tokio::spawn(async move {
            loop {
                let next = center.next_toast();
                match next {
                    Some(toast) => {
                        sink.show(&toast);
                        tokio::time::sleep(center.inner.toast_interval).await;
                    }
                    None => center.inner.wake.notified().await,
                }
            }
        })
    }
}
