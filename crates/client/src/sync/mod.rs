//! Generic server-synchronized collection.
//!
//! Cart and wishlist share one shape: an in-memory list of entities that is
//! mirrored to guest storage while signed out, pushed to the server after
//! local edits settle while signed in, and merged into the account on login.
//! [`SyncedCollection`] owns that shape; the providers add domain rules on
//! top.
//!
//! Server responses always carry the whole collection and replace the local
//! copy wholesale. A debounced push is discarded if another local edit
//! landed while it was in flight, since that edit has already scheduled its
//! own push.

mod debounce;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use storefront_sync_core::api::CollectionPayload;
use storefront_sync_core::cart::CartItem;
use storefront_sync_core::wishlist::WishlistItem;
use storefront_sync_core::{CartItemId, WishlistItemId};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::storage::{GuestSlot, LocalStore, keys};

pub use debounce::{Debouncer, FlushFuture};

/// An item that can live in a [`SyncedCollection`].
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: Clone + PartialEq + fmt::Display + From<String> + Send + Sync;

    fn id(&self) -> &Self::Id;
}

impl Entity for CartItem {
    type Id = CartItemId;

    fn id(&self) -> &CartItemId {
        &self.id
    }
}

impl Entity for WishlistItem {
    type Id = WishlistItemId;

    fn id(&self) -> &WishlistItemId {
        &self.id
    }
}

/// Storage key and endpoints for one kind of collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Short name used in logs and error reports.
    pub name: &'static str,
    /// Guest storage key.
    pub guest_key: &'static str,
    /// `GET` returning the whole collection.
    pub fetch: &'static str,
    /// `POST {items}` replacing the server copy.
    pub sync: &'static str,
    /// `POST {items}` folding guest items into the account.
    pub merge: &'static str,
}

impl CollectionSpec {
    pub const CART: Self = Self {
        name: "cart",
        guest_key: keys::GUEST_CART,
        fetch: "cart",
        sync: "cart/sync",
        merge: "cart/merge",
    };

    pub const WISHLIST: Self = Self {
        name: "wishlist",
        guest_key: keys::GUEST_WISHLIST,
        fetch: "wishlist",
        sync: "wishlist/sync",
        merge: "wishlist/merge",
    };
}

/// Identifies one login session. Issued by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of a guest merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Guest items were sent and the account copy adopted.
    Merged { items: usize },
    /// Nothing was stored locally.
    Empty,
    /// This session already had its one attempt.
    AlreadyAttempted,
    /// The merge request failed; guest items stay stored.
    Failed,
}

/// Called when a background operation fails.
pub type FailureHook = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// A collection kept in step with the server.
///
/// Cheap to clone; clones share state. The debounce timer is aborted when
/// the last clone is dropped.
pub struct SyncedCollection<E: Entity> {
    inner: Arc<Inner<E>>,
}

impl<E: Entity> Clone for SyncedCollection<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity> fmt::Debug for SyncedCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedCollection")
            .field("name", &self.inner.spec.name)
            .field("authenticated", &self.is_authenticated())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

struct Inner<E: Entity> {
    spec: CollectionSpec,
    api: ApiClient,
    items: RwLock<Vec<E>>,
    guest: GuestSlot<Vec<E>>,
    authenticated: AtomicBool,
    // Set once the account copy has come from the server this session.
    loaded: AtomicBool,
    // Bumped under the items write lock on every local change.
    generation: AtomicU64,
    merged_session: Mutex<Option<SessionId>>,
    on_failure: Option<FailureHook>,
    debouncer: Debouncer,
}

impl<E: Entity> SyncedCollection<E> {
    /// Create a collection in guest mode, loaded from guest storage.
    #[must_use]
    pub fn new(
        spec: CollectionSpec,
        api: ApiClient,
        store: Arc<dyn LocalStore>,
        debounce: Duration,
        on_failure: Option<FailureHook>,
    ) -> Self {
        let guest = GuestSlot::new(store, spec.guest_key);
        let initial = guest.load();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner<E>>| {
            let weak = weak.clone();
            Inner {
                spec,
                api,
                items: RwLock::new(initial),
                guest,
                authenticated: AtomicBool::new(false),
                loaded: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                merged_session: Mutex::new(None),
                on_failure,
                debouncer: Debouncer::new(debounce, move || -> FlushFuture {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.flush().await;
                        }
                    })
                }),
            }
        });

        Self { inner }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.spec.name
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::Acquire)
    }

    /// Number of local changes applied so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Whether a debounced push is waiting to fire.
    #[must_use]
    pub fn has_pending_sync(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Copy of the current items.
    pub async fn snapshot(&self) -> Vec<E> {
        self.inner.items.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.items.read().await.is_empty()
    }

    pub async fn find(&self, id: &E::Id) -> Option<E> {
        self.inner
            .items
            .read()
            .await
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub async fn any(&self, predicate: impl Fn(&E) -> bool) -> bool {
        self.inner.items.read().await.iter().any(predicate)
    }

    /// Items currently held in guest storage.
    #[must_use]
    pub fn guest_items(&self) -> Vec<E> {
        self.inner.guest.load()
    }

    /// Apply a local edit.
    ///
    /// The edit runs against a copy; on error nothing changes. In guest mode
    /// the result is written to guest storage, otherwise a debounced push is
    /// scheduled.
    ///
    /// # Errors
    ///
    /// Returns the edit's error, or `ClientError::Storage` if the guest copy
    /// cannot be written (the in-memory change is kept). When signed in
    /// before the account copy has loaded, returns `ClientError::Validation`
    /// and changes nothing.
    pub async fn mutate<R>(&self, edit: impl FnOnce(&mut Vec<E>) -> Result<R>) -> Result<R> {
        if self.is_authenticated() && !self.inner.loaded.load(Ordering::Acquire) {
            return Err(ClientError::Validation(
                "Your saved items could not be loaded. Refresh and try again.".to_string(),
            ));
        }
        let mut items = self.inner.items.write().await;
        let mut next = items.clone();
        let output = edit(&mut next)?;
        *items = next;
        self.inner.generation.fetch_add(1, Ordering::AcqRel);

        if self.is_authenticated() {
            self.inner.debouncer.schedule();
            Ok(output)
        } else {
            self.inner.guest.save(&items)?;
            Ok(output)
        }
    }

    /// Adopt a collection returned by the server (or rebuilt locally).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if in guest mode and the guest copy
    /// cannot be written.
    pub async fn replace(&self, next: Vec<E>) -> Result<()> {
        let mut items = self.inner.items.write().await;
        *items = next;
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        if self.is_authenticated() {
            self.inner.loaded.store(true, Ordering::Release);
        } else {
            self.inner.guest.save(&items)?;
        }
        Ok(())
    }

    /// Reload from the server when signed in, or from guest storage.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the fetch fails; local items are unchanged.
    #[instrument(skip(self), fields(collection = self.inner.spec.name))]
    pub async fn fetch(&self) -> Result<()> {
        if !self.is_authenticated() {
            let guest = self.inner.guest.load();
            *self.inner.items.write().await = guest;
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        let payload: CollectionPayload<E> = self.inner.api.get(self.inner.spec.fetch).await?;
        debug!(items = payload.items.len(), "Fetched collection");
        self.replace(payload.items).await
    }

    /// Push a pending debounced change now, ahead of a direct server call.
    ///
    /// Keeps the server seeing edits in the order they were made. Does
    /// nothing when no push is pending.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the push fails.
    pub async fn settle(&self) -> Result<()> {
        if self.inner.debouncer.cancel() {
            self.inner.push().await?;
        }
        Ok(())
    }

    /// Switch to the signed-in mode for `session` and reconcile.
    ///
    /// Merges guest items once per session; when nothing was merged the
    /// account copy is fetched instead. If neither reaches the server the
    /// collection is left empty and refuses local edits until a fetch
    /// succeeds, so guest items are never pushed as the account copy.
    pub async fn enter_session(&self, session: SessionId) -> MergeOutcome {
        self.inner.loaded.store(false, Ordering::Release);
        self.inner.authenticated.store(true, Ordering::Release);

        let outcome = self.merge_guest(session).await;
        if !matches!(outcome, MergeOutcome::Merged { .. })
            && let Err(err) = self.fetch().await
        {
            self.inner.fail(&err, "fetch");
            if !self.inner.loaded.load(Ordering::Acquire) {
                self.inner.debouncer.cancel();
                self.inner.items.write().await.clear();
                self.inner.generation.fetch_add(1, Ordering::AcqRel);
                warn!(
                    collection = self.inner.spec.name,
                    "Account copy unavailable, local edits paused"
                );
            }
        }
        outcome
    }

    /// Return to guest mode: drop account items and any pending push.
    pub async fn leave_session(&self) {
        self.inner.authenticated.store(false, Ordering::Release);
        self.inner.loaded.store(false, Ordering::Release);
        self.inner.debouncer.cancel();

        let guest = self.inner.guest.load();
        *self.inner.items.write().await = guest;
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        debug!(collection = self.inner.spec.name, "Collection reset to guest mode");
    }

    /// Send guest items to the merge endpoint, at most once per session.
    ///
    /// The attempt is recorded before the request goes out, so a failure is
    /// not retried within the same session. On success the guest copy is
    /// cleared and the merged account collection adopted.
    #[instrument(skip(self), fields(collection = self.inner.spec.name))]
    pub async fn merge_guest(&self, session: SessionId) -> MergeOutcome {
        {
            let mut merged = self
                .inner
                .merged_session
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *merged == Some(session) {
                debug!("Guest merge already attempted for this session");
                return MergeOutcome::AlreadyAttempted;
            }
            *merged = Some(session);
        }

        let guest = self.inner.guest.load();
        if guest.is_empty() {
            return MergeOutcome::Empty;
        }
        let count = guest.len();

        let response: Result<CollectionPayload<E>> = self
            .inner
            .api
            .post(self.inner.spec.merge, &CollectionPayload::new(guest))
            .await;

        match response {
            Ok(payload) => {
                {
                    let mut items = self.inner.items.write().await;
                    *items = payload.items;
                    self.inner.generation.fetch_add(1, Ordering::AcqRel);
                }
                self.inner.loaded.store(true, Ordering::Release);
                if let Err(err) = self.inner.guest.clear() {
                    ClientError::from(err).report(&self.inner.operation("merge"));
                }
                info!(merged = count, "Merged guest collection into account");
                MergeOutcome::Merged { items: count }
            }
            Err(err) => {
                self.inner.fail(&err, "merge");
                MergeOutcome::Failed
            }
        }
    }
}

impl<E: Entity> Inner<E> {
    fn operation(&self, action: &str) -> String {
        format!("{}.{action}", self.spec.name)
    }

    fn fail(&self, err: &ClientError, action: &str) {
        err.report(&self.operation(action));
        if let Some(hook) = &self.on_failure {
            hook(err);
        }
    }

    async fn flush(&self) {
        if let Err(err) = self.push().await {
            self.fail(&err, "sync");
        }
    }

    #[instrument(skip(self), fields(collection = self.spec.name))]
    async fn push(&self) -> Result<()> {
        if !self.authenticated.load(Ordering::Acquire) || !self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        let (generation, items) = {
            let items = self.items.read().await;
            (self.generation.load(Ordering::Acquire), items.clone())
        };

        let payload: CollectionPayload<E> = self
            .api
            .post(self.spec.sync, &CollectionPayload::new(items))
            .await?;

        if !self.commit_if_current(generation, payload.items).await {
            debug!(generation, "Discarding stale sync response");
        }
        Ok(())
    }

    /// Adopt a push response taken at `generation`, unless newer edits exist.
    async fn commit_if_current(&self, generation: u64, next: Vec<E>) -> bool {
        let mut items = self.items.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        *items = next;
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: String,
        label: String,
    }

    impl Tag {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                label: id.to_uppercase(),
            }
        }
    }

    impl Entity for Tag {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    const SPEC: CollectionSpec = CollectionSpec {
        name: "tags",
        guest_key: "guest_tags",
        fetch: "tags",
        sync: "tags/sync",
        merge: "tags/merge",
    };

    fn collection(server: &MockServer, store: Arc<MemoryStore>) -> SyncedCollection<Tag> {
        let config = ClientConfig::with_api_url(&server.url("/api"), "/tmp/unused").unwrap();
        SyncedCollection::new(
            SPEC,
            ApiClient::new(&config).unwrap(),
            store,
            Duration::from_millis(50),
            None,
        )
    }

    fn push(tag: &str) -> impl FnOnce(&mut Vec<Tag>) -> Result<()> {
        let tag = Tag::new(tag);
        move |items| {
            items.push(tag);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_guest_edits_persist_locally() {
        let server = MockServer::start();
        let store = Arc::new(MemoryStore::new());
        let tags = collection(&server, Arc::clone(&store));

        tags.mutate(push("a")).await.unwrap();
        tags.mutate(push("b")).await.unwrap();

        assert_eq!(tags.guest_items(), vec![Tag::new("a"), Tag::new("b")]);
        assert!(!tags.has_pending_sync());

        // A fresh collection on the same store starts from the guest copy.
        let reopened = collection(&server, store);
        assert_eq!(reopened.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_edit_changes_nothing() {
        let server = MockServer::start();
        let tags = collection(&server, Arc::new(MemoryStore::new()));
        tags.mutate(push("a")).await.unwrap();
        let before = tags.generation();

        let result = tags
            .mutate(|items: &mut Vec<Tag>| {
                items.clear();
                Err::<(), _>(ClientError::Validation("nope".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(tags.snapshot().await, vec![Tag::new("a")]);
        assert_eq!(tags.generation(), before);
    }

    #[tokio::test]
    async fn test_signed_in_edits_push_once_after_quiet_period() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"success": true, "data": {"items": []}}));
        });
        let sync = server.mock(|when, then| {
            when.method(POST)
                .path("/api/tags/sync")
                .json_body(json!({"items": [
                    {"id": "a", "label": "A"},
                    {"id": "b", "label": "B"},
                    {"id": "c", "label": "C"}
                ]}));
            then.status(200).json_body(json!({"success": true, "data": {"items": [
                {"id": "a", "label": "A"},
                {"id": "b", "label": "B"},
                {"id": "c", "label": "C (server)"}
            ]}}));
        });

        let tags = collection(&server, Arc::new(MemoryStore::new()));
        assert_eq!(tags.enter_session(SessionId::new()).await, MergeOutcome::Empty);

        for tag in ["a", "b", "c"] {
            tags.mutate(push(tag)).await.unwrap();
        }
        assert!(tags.has_pending_sync());
        tokio::time::sleep(Duration::from_millis(400)).await;

        sync.assert_calls(1);
        let items = tags.snapshot().await;
        assert_eq!(items[2].label, "C (server)");
        assert!(tags.guest_items().is_empty());
    }

    #[tokio::test]
    async fn test_stale_push_response_is_discarded() {
        let server = MockServer::start();
        let tags = collection(&server, Arc::new(MemoryStore::new()));
        tags.mutate(push("a")).await.unwrap();

        let taken_at = tags.generation();
        tags.mutate(push("b")).await.unwrap();

        assert!(!tags.inner.commit_if_current(taken_at, vec![Tag::new("x")]).await);
        assert_eq!(tags.len().await, 2);

        let current = tags.generation();
        assert!(tags.inner.commit_if_current(current, vec![Tag::new("x")]).await);
        assert_eq!(tags.snapshot().await, vec![Tag::new("x")]);
    }

    #[tokio::test]
    async fn test_merge_runs_once_per_session_and_clears_guest_copy() {
        let server = MockServer::start();
        let merge = server.mock(|when, then| {
            when.method(POST)
                .path("/api/tags/merge")
                .json_body(json!({"items": [{"id": "guest-1", "label": "GUEST-1"}]}));
            then.status(200).json_body(json!({"success": true, "data": {"items": [
                {"id": "srv-1", "label": "GUEST-1"},
                {"id": "srv-2", "label": "SAVED"}
            ]}}));
        });
        let fetch = server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"success": true, "data": {"items": [
                {"id": "srv-1", "label": "GUEST-1"},
                {"id": "srv-2", "label": "SAVED"}
            ]}}));
        });

        let store = Arc::new(MemoryStore::new());
        let tags = collection(&server, Arc::clone(&store));
        tags.mutate(push("guest-1")).await.unwrap();

        let session = SessionId::new();
        assert_eq!(
            tags.enter_session(session).await,
            MergeOutcome::Merged { items: 1 }
        );
        assert!(!store.contains(SPEC.guest_key));
        assert_eq!(tags.len().await, 2);

        assert_eq!(
            tags.enter_session(session).await,
            MergeOutcome::AlreadyAttempted
        );
        merge.assert_calls(1);
        fetch.assert_calls(1);

        // A new session with nothing stored locally skips the request.
        assert_eq!(tags.merge_guest(SessionId::new()).await, MergeOutcome::Empty);
        merge.assert_calls(1);
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_guest_copy_and_is_not_retried() {
        let server = MockServer::start();
        let merge = server.mock(|when, then| {
            when.method(POST).path("/api/tags/merge");
            then.status(500).json_body(json!({"success": false, "error": "db down"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"success": true, "data": {"items": []}}));
        });

        let tags = collection(&server, Arc::new(MemoryStore::new()));
        tags.mutate(push("keep")).await.unwrap();

        let session = SessionId::new();
        assert_eq!(tags.enter_session(session).await, MergeOutcome::Failed);
        assert_eq!(tags.merge_guest(session).await, MergeOutcome::AlreadyAttempted);

        merge.assert_calls(1);
        assert_eq!(tags.guest_items(), vec![Tag::new("keep")]);
    }

    #[tokio::test]
    async fn test_offline_sign_in_never_pushes_guest_items_as_account() {
        let server = MockServer::start();
        let merge = server.mock(|when, then| {
            when.method(POST).path("/api/tags/merge");
            then.status(503).json_body(json!({"success": false, "error": "offline"}));
        });
        let mut fetch = server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(503).json_body(json!({"success": false, "error": "offline"}));
        });
        let sync = server.mock(|when, then| {
            when.method(POST).path("/api/tags/sync");
            then.status(200).json_body(json!({"success": true, "data": {"items": []}}));
        });

        let store = Arc::new(MemoryStore::new());
        let tags = collection(&server, Arc::clone(&store));
        tags.mutate(push("guest-1")).await.unwrap();

        assert_eq!(tags.enter_session(SessionId::new()).await, MergeOutcome::Failed);
        merge.assert_calls(1);
        assert!(tags.is_empty().await);

        let err = tags.mutate(push("x")).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        tags.settle().await.unwrap();
        assert!(!tags.has_pending_sync());
        sync.assert_calls(0);
        assert_eq!(tags.guest_items(), vec![Tag::new("guest-1")]);

        // Edits resume once the account copy arrives.
        fetch.delete();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"success": true, "data": {"items": [
                {"id": "srv-1", "label": "SAVED"}
            ]}}));
        });
        tags.fetch().await.unwrap();
        tags.mutate(push("x")).await.unwrap();
        tags.settle().await.unwrap();
        sync.assert_calls(1);
    }

    #[tokio::test]
    async fn test_leave_session_drops_account_items_and_pending_push() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"success": true, "data": {"items": [
                {"id": "srv-1", "label": "ACCOUNT"}
            ]}}));
        });
        let sync = server.mock(|when, then| {
            when.method(POST).path("/api/tags/sync");
            then.status(200).json_body(json!({"success": true, "data": {"items": []}}));
        });

        let tags = collection(&server, Arc::new(MemoryStore::new()));
        tags.enter_session(SessionId::new()).await;
        assert_eq!(tags.len().await, 1);

        tags.mutate(push("b")).await.unwrap();
        tags.leave_session().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!tags.is_authenticated());
        assert!(tags.is_empty().await);
        sync.assert_calls(0);
    }

    #[tokio::test]
    async fn test_settle_pushes_pending_change_immediately() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"success": true, "data": {"items": []}}));
        });
        let sync = server.mock(|when, then| {
            when.method(POST).path("/api/tags/sync");
            then.status(200).json_body(json!({"success": true, "data": {"items": [
                {"id": "a", "label": "A"}
            ]}}));
        });

        let tags = collection(&server, Arc::new(MemoryStore::new()));
        tags.enter_session(SessionId::new()).await;
        tags.mutate(push("a")).await.unwrap();

        tags.settle().await.unwrap();
        assert!(!tags.has_pending_sync());
        sync.assert_calls(1);

        tags.settle().await.unwrap();
        sync.assert_calls(1);
    }
}
