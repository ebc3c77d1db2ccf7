//! Auth provider: sign-in, session restore, profile.
//!
//! The session token is kept in local storage (the browser cookie's role)
//! and attached to every API call. The signed-in user is mirrored locally
//! only when a cache key is configured, and then only encrypted.
//!
//! Session changes are published on a `watch` channel. Each sign-in gets a
//! fresh [`SessionId`], which is what guest merges are keyed on.

use std::sync::Arc;

use reqwest::Method;
use secrecy::SecretString;
use tokio::sync::{RwLock, watch};
use tracing::{info, instrument, warn};

use storefront_sync_core::user::{
    AddressFields, AuthPayload, LoginRequest, ProfileUpdate, RegisterRequest, SessionStatus, User,
};
use storefront_sync_core::{AddressId, UserId};

use crate::api::{ApiClient, segment};
use crate::crypto::CacheCipher;
use crate::error::{ClientError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::notifications::NotificationCenter;
use crate::storage::{LocalStore, keys};
use crate::sync::SessionId;

/// Whether someone is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Guest,
    Authenticated { session: SessionId, user_id: UserId },
}

impl SessionState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub const fn session(&self) -> Option<SessionId> {
        match self {
            Self::Authenticated { session, .. } => Some(*session),
            Self::Guest => None,
        }
    }
}

/// Signed-in user and session.
#[derive(Clone)]
pub struct AuthProvider {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    api: ApiClient,
    store: Arc<dyn LocalStore>,
    cipher: Option<CacheCipher>,
    user: RwLock<Option<User>>,
    state: watch::Sender<SessionState>,
    notifications: NotificationCenter,
}

impl std::fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProvider")
            .field("state", &*self.inner.state.borrow())
            .field("encrypted_cache", &self.inner.cipher.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthProvider {
    #[must_use]
    pub fn new(
        api: ApiClient,
        store: Arc<dyn LocalStore>,
        cipher: Option<CacheCipher>,
        notifications: NotificationCenter,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Guest);
        Self {
            inner: Arc::new(AuthInner {
                api,
                store,
                cipher,
                user: RwLock::new(None),
                state,
                notifications,
            }),
        }
    }

    /// Receive every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.inner.user.read().await.clone()
    }

    // =========================================================================
    // Sign-in and sign-out
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for malformed credentials, or the
    /// server's rejection.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .try_login(email, password)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "auth.login"))?;
        self.inner
            .notifications
            .success(format!("Welcome back, {}", user.name));
        Ok(user)
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for malformed details, or the
    /// server's rejection (for example an email already in use).
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<User> {
        let user = self
            .try_register(name, email, password, phone)
            .await
            .inspect_err(|e| self.inner.notifications.report_failure(e, "auth.register"))?;
        self.inner
            .notifications
            .success(format!("Welcome, {}", user.name));
        Ok(user)
    }

    /// Sign out locally, telling the server first.
    ///
    /// The local session ends even if the server call fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.inner.api.has_token()
            && let Err(err) = self
                .inner
                .api
                .send::<()>(Method::POST, "auth/logout", None)
                .await
        {
            warn!(error = %err, "Server logout failed, ending session locally");
        }

        self.end_session().await;
        add_breadcrumb("auth", "Signed out", None);
        self.inner.notifications.info("You have been signed out");
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<User> {
        let request = LoginRequest::new(email, password)?;
        let payload: AuthPayload = self.inner.api.post("auth/login", &request).await?;
        self.establish(payload).await
    }

    async fn try_register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<User> {
        let request = RegisterRequest::new(name, email, password, phone)?;
        let payload: AuthPayload = self.inner.api.post("auth/register", &request).await?;
        self.establish(payload).await
    }

    async fn establish(&self, payload: AuthPayload) -> Result<User> {
        let AuthPayload { token, user } = payload;

        self.inner.store.set(keys::AUTH_TOKEN, &token)?;
        self.inner.api.set_token(Some(SecretString::from(token)));
        self.activate(user.clone()).await;
        Ok(user)
    }

    /// Adopt `user` and open a new session.
    async fn activate(&self, user: User) {
        self.cache_user(&user);
        set_sentry_user(&user.id, Some(user.email.as_str()));
        add_breadcrumb("auth", "Signed in", Some(&[("user_id", user.id.as_str())]));
        info!(user_id = %user.id, "Session started");

        let user_id = user.id.clone();
        *self.inner.user.write().await = Some(user);
        self.inner.state.send_replace(SessionState::Authenticated {
            session: SessionId::new(),
            user_id,
        });
    }

    async fn end_session(&self) {
        self.inner.api.set_token(None);
        for key in [keys::AUTH_TOKEN, keys::USER_CACHE] {
            if let Err(err) = self.inner.store.remove(key) {
                ClientError::from(err).report("auth.end_session");
            }
        }
        *self.inner.user.write().await = None;
        clear_sentry_user();
        self.inner.state.send_replace(SessionState::Guest);
    }

    // =========================================================================
    // Session checks
    // =========================================================================

    /// Resume a session from the stored token.
    ///
    /// The server is asked who the token belongs to. A rejected token is
    /// discarded. If the server cannot be reached, the encrypted user mirror
    /// (when present) keeps the session going offline.
    ///
    /// Returns whether a session is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server is unreachable and no cached user
    /// is available.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<bool> {
        let token = match self.inner.store.get(keys::AUTH_TOKEN) {
            Ok(Some(token)) if !token.trim().is_empty() => token,
            Ok(_) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        self.inner.api.set_token(Some(SecretString::from(token)));

        match self.inner.api.get::<User>("auth/me").await {
            Ok(user) => {
                self.activate(user).await;
                Ok(true)
            }
            Err(ClientError::Unauthorized(reason)) => {
                info!(reason = %reason, "Stored session rejected");
                self.end_session().await;
                Ok(false)
            }
            Err(err) => match self.cached_user() {
                Some(user) => {
                    warn!(error = %err, "Resuming session from cached user");
                    self.activate(user).await;
                    Ok(true)
                }
                None => {
                    self.inner.api.set_token(None);
                    err.report("auth.restore");
                    Err(err)
                }
            },
        }
    }

    /// Fetch the signed-in user from the server.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` without a session. A rejected
    /// token ends the session and returns `ClientError::Unauthorized`.
    pub async fn me(&self) -> Result<User> {
        self.require_session()?;
        match self.inner.api.get::<User>("auth/me").await {
            Ok(user) => {
                self.store_user(user.clone()).await;
                Ok(user)
            }
            Err(err) => Err(self.handle_session_error(err, "auth.me").await),
        }
    }

    /// Ask the server whether the session is still valid.
    ///
    /// An invalid session is ended locally.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the check itself fails.
    pub async fn validate_session(&self) -> Result<bool> {
        if !self.inner.api.has_token() {
            return Ok(false);
        }
        match self.inner.api.get::<SessionStatus>("auth/session").await {
            Ok(status) if status.valid => Ok(true),
            Ok(_) | Err(ClientError::Unauthorized(_)) => {
                info!("Session expired");
                self.end_session().await;
                self.inner
                    .notifications
                    .info("Your session has expired. Please sign in again.");
                Ok(false)
            }
            Err(err) => {
                err.report("auth.session");
                Err(err)
            }
        }
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Update name, phone or preferences.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` without a session, or the
    /// server's rejection.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let user = self
            .account_call("auth.profile", async {
                self.inner.api.put::<_, User>("auth/profile", update).await
            })
            .await?;
        self.inner.notifications.success("Profile updated");
        Ok(user)
    }

    /// Add an address to the address book.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` without a session, or the
    /// server's rejection.
    pub async fn add_address(&self, address: &AddressFields) -> Result<User> {
        self.account_call("auth.add_address", async {
            self.inner.api.post::<_, User>("auth/addresses", address).await
        })
        .await
    }

    /// Remove an address from the address book.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` without a session, or the
    /// server's rejection.
    pub async fn remove_address(&self, id: &AddressId) -> Result<User> {
        let path = format!("auth/addresses/{}", segment(id.as_str()));
        self.account_call("auth.remove_address", async {
            self.inner.api.delete::<User>(&path).await
        })
        .await
    }

    /// Run a call that returns the updated user, adopting it on success.
    async fn account_call(
        &self,
        operation: &str,
        call: impl Future<Output = Result<User>>,
    ) -> Result<User> {
        let result = match self.require_session() {
            Ok(()) => call.await,
            Err(err) => Err(err),
        };
        match result {
            Ok(user) => {
                self.store_user(user.clone()).await;
                Ok(user)
            }
            Err(err) => {
                let err = self.handle_session_error(err, operation).await;
                self.inner.notifications.report_failure(&err, operation);
                Err(err)
            }
        }
    }

    fn require_session(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }

    async fn handle_session_error(&self, err: ClientError, operation: &str) -> ClientError {
        if matches!(err, ClientError::Unauthorized(_)) {
            warn!(operation, "Session rejected by server");
            self.end_session().await;
        }
        err
    }

    async fn store_user(&self, user: User) {
        self.cache_user(&user);
        *self.inner.user.write().await = Some(user);
    }

    // =========================================================================
    // Encrypted user mirror
    // =========================================================================

    fn cache_user(&self, user: &User) {
        let Some(cipher) = &self.inner.cipher else {
            return;
        };
        let sealed = serde_json::to_string(user)
            .map_err(ClientError::from)
            .and_then(|json| cipher.seal(&json).map_err(ClientError::from));
        let stored = sealed.and_then(|value| {
            self.inner
                .store
                .set(keys::USER_CACHE, &value)
                .map_err(ClientError::from)
        });
        if let Err(err) = stored {
            err.report("auth.cache_user");
        }
    }

    fn cached_user(&self) -> Option<User> {
        let cipher = self.inner.cipher.as_ref()?;
        let raw = self.inner.store.get(keys::USER_CACHE).ok().flatten()?;
        if !CacheCipher::is_sealed(&raw) {
            warn!("Ignoring unencrypted user cache");
            return None;
        }
        let json = cipher
            .open(&raw)
            .inspect_err(|e| warn!(error = %e, "User cache could not be decrypted"))
            .ok()?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, "User cache is unreadable"))
            .ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use secrecy::SecretBox;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStore;

    fn user_json() -> serde_json::Value {
        json!({
            "id": "u1",
            "name": "Asha",
            "email": "asha@example.com",
            "role": "customer"
        })
    }

    fn provider(server: &MockServer, store: Arc<MemoryStore>, encrypted: bool) -> AuthProvider {
        let config = ClientConfig::with_api_url(&server.url("/api"), "/tmp/unused").unwrap();
        let api = ApiClient::new(&config).unwrap();
        let notifications = NotificationCenter::new(api.clone(), 50, Duration::from_secs(3));
        let cipher = encrypted.then(|| CacheCipher::new(&SecretBox::new(Box::new([9u8; 32]))));
        AuthProvider::new(api, store, cipher, notifications)
    }

    #[tokio::test]
    async fn test_login_stores_token_and_encrypted_user() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .json_body(json!({"email": "asha@example.com", "password": "hunter22!"}));
            then.status(200).json_body(json!({"success": true, "data": {
                "token": "tok_abc",
                "user": user_json()
            }}));
        });

        let store = Arc::new(MemoryStore::new());
        let auth = provider(&server, store.clone(), true);
        let mut states = auth.subscribe();

        let user = auth.login(" Asha@Example.com ", "hunter22!").await.unwrap();
        login.assert();

        assert_eq!(user.name, "Asha");
        assert!(states.has_changed().unwrap());
        assert!(states.borrow_and_update().is_authenticated());
        assert_eq!(store.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("tok_abc"));

        let cached = store.get(keys::USER_CACHE).unwrap().unwrap();
        assert!(CacheCipher::is_sealed(&cached));
        assert!(!cached.contains("asha@example.com"));
    }

    #[tokio::test]
    async fn test_user_not_mirrored_without_cache_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200).json_body(json!({"success": true, "data": {
                "token": "tok_abc",
                "user": user_json()
            }}));
        });

        let store = Arc::new(MemoryStore::new());
        let auth = provider(&server, store.clone(), false);
        auth.login("asha@example.com", "hunter22!").await.unwrap();

        assert!(store.contains(keys::AUTH_TOKEN));
        assert!(!store.contains(keys::USER_CACHE));
    }

    #[tokio::test]
    async fn test_invalid_credentials_never_reach_server() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200);
        });

        let auth = provider(&server, Arc::new(MemoryStore::new()), false);
        let err = auth.login("not-an-email", "hunter22!").await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert!(!auth.is_authenticated());
        login.assert_calls(0);
    }

    #[tokio::test]
    async fn test_each_login_opens_a_new_session() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200).json_body(json!({"success": true, "data": {
                "token": "tok_abc",
                "user": user_json()
            }}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(200).json_body(json!({"success": true}));
        });

        let auth = provider(&server, Arc::new(MemoryStore::new()), false);
        auth.login("asha@example.com", "hunter22!").await.unwrap();
        let first = auth.session_state().session().unwrap();

        auth.logout().await;
        assert_eq!(auth.session_state(), SessionState::Guest);

        auth.login("asha@example.com", "hunter22!").await.unwrap();
        assert_ne!(auth.session_state().session().unwrap(), first);
    }

    #[tokio::test]
    async fn test_restore_discards_rejected_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/auth/me");
            then.status(401).json_body(json!({"success": false, "error": "jwt expired"}));
        });

        let store = Arc::new(MemoryStore::new());
        store.set(keys::AUTH_TOKEN, "stale").unwrap();
        let auth = provider(&server, store.clone(), false);

        assert!(!auth.restore().await.unwrap());
        assert!(!store.contains(keys::AUTH_TOKEN));
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_cached_user_when_offline() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200).json_body(json!({"success": true, "data": {
                "token": "tok_abc",
                "user": user_json()
            }}));
        });
        let store = Arc::new(MemoryStore::new());
        provider(&server, store.clone(), true)
            .login("asha@example.com", "hunter22!")
            .await
            .unwrap();

        let offline = MockServer::start();
        offline.mock(|when, then| {
            when.method(GET).path("/api/auth/me");
            then.status(503);
        });
        let auth = provider(&offline, store, true);

        assert!(auth.restore().await.unwrap());
        assert_eq!(auth.current_user().await.unwrap().name, "Asha");
    }

    #[tokio::test]
    async fn test_profile_calls_require_session() {
        let server = MockServer::start();
        let auth = provider(&server, Arc::new(MemoryStore::new()), false);

        let err = auth
            .update_profile(&ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_expired_session_check_signs_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200).json_body(json!({"success": true, "data": {
                "token": "tok_abc",
                "user": user_json()
            }}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/auth/session");
            then.status(200).json_body(json!({"success": true, "data": {"valid": false}}));
        });

        let auth = provider(&server, Arc::new(MemoryStore::new()), false);
        auth.login("asha@example.com", "hunter22!").await.unwrap();

        assert!(!auth.validate_session().await.unwrap());
        assert!(!auth.is_authenticated());
        assert!(auth.current_user().await.is_none());
    }
}
