//! Composition root wiring the providers together.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::{AuthProvider, SessionState};
use crate::cart::CartProvider;
use crate::config::ClientConfig;
use crate::crypto::CacheCipher;
use crate::error::{ClientError, Result};
use crate::notifications::{NotificationCenter, ToastSink};
use crate::storage::{FileStore, LocalStore};
use crate::sync::{CollectionSpec, FailureHook, SyncedCollection};
use crate::theme::ThemeStore;
use crate::wishlist::WishlistProvider;

/// All storefront state for one shopper.
///
/// This struct is cheaply cloneable via `Arc`. Background tasks started by
/// [`Storefront::start`] are aborted when the last clone is dropped.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    api: ApiClient,
    notifications: NotificationCenter,
    auth: AuthProvider,
    cart: CartProvider,
    wishlist: WishlistProvider,
    theme: ThemeStore,
    reconciler: Reconciler,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for StorefrontInner {
    fn drop(&mut self) {
        for task in self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Create a storefront backed by `store`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn LocalStore>) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let notifications = NotificationCenter::new(
            api.clone(),
            config.notification_cap,
            config.toast_interval,
        );

        let on_failure: FailureHook = {
            let notifications = notifications.clone();
            Arc::new(move |err: &ClientError| notifications.error(err.user_message()))
        };

        let cart = CartProvider::new(
            SyncedCollection::new(
                CollectionSpec::CART,
                api.clone(),
                Arc::clone(&store),
                config.sync_debounce,
                Some(Arc::clone(&on_failure)),
            ),
            api.clone(),
            notifications.clone(),
            Arc::clone(&store),
            config.pricing,
        );
        let wishlist = WishlistProvider::new(
            SyncedCollection::new(
                CollectionSpec::WISHLIST,
                api.clone(),
                Arc::clone(&store),
                config.sync_debounce,
                Some(on_failure),
            ),
            api.clone(),
            notifications.clone(),
        );

        let cipher = config.cache_key.as_ref().map(CacheCipher::new);
        let auth = AuthProvider::new(
            api.clone(),
            Arc::clone(&store),
            cipher,
            notifications.clone(),
        );
        let theme = ThemeStore::new(store);

        let reconciler = Reconciler {
            auth: auth.clone(),
            cart: cart.clone(),
            wishlist: wishlist.clone(),
            applied: Arc::new(AsyncMutex::new(SessionState::Guest)),
        };

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                notifications,
                auth,
                cart,
                wishlist,
                theme,
                reconciler,
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Create a storefront persisting to the configured data directory.
    ///
    /// # Errors
    ///
    /// See [`Storefront::new`].
    pub fn open(config: ClientConfig) -> Result<Self> {
        let store: Arc<dyn LocalStore> = Arc::new(FileStore::new(&config.data_dir));
        Self::new(config, store)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthProvider {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &CartProvider {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistProvider {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.inner.notifications
    }

    #[must_use]
    pub fn theme(&self) -> &ThemeStore {
        &self.inner.theme
    }

    /// Start the session watcher and the toast display loop.
    ///
    /// The watcher reconciles cart and wishlist whenever the session
    /// changes.
    pub fn start(&self, sink: Arc<dyn ToastSink>) {
        let reconciler = self.inner.reconciler.clone();
        let mut changes = self.inner.auth.subscribe();
        let watcher = tokio::spawn(async move {
            reconciler.reconcile().await;
            while changes.changed().await.is_ok() {
                reconciler.reconcile().await;
            }
            debug!("Session watcher stopped");
        });
        let display = self.inner.notifications.spawn_display_loop(sink);

        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([watcher, display]);
    }

    /// Bring cart and wishlist in line with the current session now.
    ///
    /// Does nothing if the session has not changed since the last call.
    /// Safe to call alongside the watcher started by [`Storefront::start`].
    pub async fn reconcile(&self) {
        self.inner.reconciler.reconcile().await;
    }

    /// Push pending debounced changes. Call before shutting down.
    ///
    /// # Errors
    ///
    /// Returns the first push failure; both collections are attempted.
    pub async fn flush(&self) -> Result<()> {
        let cart = self.inner.cart.flush().await;
        let wishlist = self.inner.wishlist.flush().await;
        cart.and(wishlist)
    }
}

/// Applies session changes to the collections, once per change.
#[derive(Clone)]
struct Reconciler {
    auth: AuthProvider,
    cart: CartProvider,
    wishlist: WishlistProvider,
    applied: Arc<AsyncMutex<SessionState>>,
}

impl Reconciler {
    async fn reconcile(&self) {
        let mut applied = self.applied.lock().await;
        let current = self.auth.session_state();
        if *applied == current {
            return;
        }

        match &current {
            SessionState::Authenticated { session, user_id } => {
                let cart = self.cart.begin_session(*session).await;
                let wishlist = self.wishlist.begin_session(*session).await;
                info!(%user_id, ?cart, ?wishlist, "Collections reconciled with account");
            }
            SessionState::Guest => {
                self.cart.end_session().await;
                self.wishlist.end_session().await;
                info!("Collections reset to guest mode");
            }
        }
        *applied = current;
    }
}
