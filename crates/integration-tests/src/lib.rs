//! Integration tests for Storefront Sync.
//!
//! Each test drives a full [`Storefront`] against an `httpmock` server
//! standing in for the storefront REST API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storefront-sync-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_merge` - Guest collections moving into the account at sign-in
//! - `cart_sync` - Debounced cart pushes and summaries
//! - `auth_flow` - Session restore, sign-out and the encrypted user mirror
//! - `notifications` - Queue bounds and the server inbox

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use rust_decimal::Decimal;
use secrecy::SecretBox;
use serde_json::{Value, json};

use storefront_sync_client::Storefront;
use storefront_sync_client::config::ClientConfig;
use storefront_sync_client::storage::{LocalStore, MemoryStore};
use storefront_sync_core::ProductId;
use storefront_sync_core::cart::{AddToCart, ProductRef};

/// Debounce used by every test storefront.
pub const DEBOUNCE: Duration = Duration::from_millis(50);

/// A storefront wired to a mock API.
pub struct TestContext {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub storefront: Storefront,
}

impl TestContext {
    /// Fresh storefront with an empty memory store and no cache key.
    #[must_use]
    pub fn new() -> Self {
        let server = MockServer::start();
        let store = Arc::new(MemoryStore::new());
        let storefront = storefront(&server, store.clone(), false);
        Self {
            server,
            store,
            storefront,
        }
    }

    /// Storefront sharing `store`, as after an app restart.
    #[must_use]
    pub fn reopen(&self, encrypted: bool) -> Storefront {
        storefront(&self.server, self.store.clone(), encrypted)
    }

    /// Mock `POST /auth/login` answering with `token` and [`user_json`].
    pub fn mock_login(&self, token: &str) -> httpmock::Mock<'_> {
        let token = token.to_string();
        self.server.mock(move |when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200)
                .json_body(ok(json!({"token": token, "user": user_json()})));
        })
    }

    /// Sign in through the auth provider and apply the new session.
    pub async fn sign_in(&self) {
        self.storefront
            .auth()
            .login("asha@example.com", "hunter22!")
            .await
            .expect("login should succeed");
        self.storefront.reconcile().await;
    }

    /// Let a debounced push fire and complete.
    pub async fn settle(&self) {
        tokio::time::sleep(DEBOUNCE * 4).await;
    }

    /// Raw guest-local value under `key`.
    #[must_use]
    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).expect("memory store never fails")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn storefront(server: &MockServer, store: Arc<MemoryStore>, encrypted: bool) -> Storefront {
    let mut config = ClientConfig::with_api_url(&server.url("/api"), "/tmp/unused")
        .expect("mock server URL is valid");
    config.sync_debounce = DEBOUNCE;
    config.toast_interval = Duration::from_millis(10);
    if encrypted {
        config.cache_key = Some(SecretBox::new(Box::new([42u8; 32])));
    }
    Storefront::new(config, store).expect("storefront should build")
}

/// Successful response envelope.
#[must_use]
pub fn ok(data: Value) -> Value {
    json!({"success": true, "data": data})
}

/// Collection payload envelope.
#[must_use]
pub fn items(items: Value) -> Value {
    ok(json!({ "items": items }))
}

#[must_use]
pub fn user_json() -> Value {
    json!({
        "id": "u1",
        "name": "Asha",
        "email": "asha@example.com",
        "role": "customer"
    })
}

/// Server-side cart line.
#[must_use]
pub fn cart_line(id: &str, product: &str, price: u32, quantity: u32) -> Value {
    json!({
        "id": id,
        "product": {"id": product, "name": format!("Product {product}"), "slug": product},
        "quantity": quantity,
        "unit_price": price.to_string()
    })
}

/// Add request for a product priced at `price`.
#[must_use]
pub fn add_request(product: &str, price: u32, quantity: u32) -> AddToCart {
    AddToCart {
        product: ProductRef {
            id: ProductId::new(product),
            name: format!("Product {product}"),
            slug: product.to_string(),
            image: None,
        },
        quantity,
        unit_price: Decimal::from(price),
        original_price: None,
        variant: None,
        customization: None,
        max_quantity: None,
    }
}
