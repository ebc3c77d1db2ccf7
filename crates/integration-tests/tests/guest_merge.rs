//! Guest collections moving into the account at sign-in.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use storefront_sync_client::notifications::TracingSink;
use storefront_sync_client::storage::keys;
use storefront_sync_core::notification::NotificationKind;
use storefront_sync_integration_tests::{TestContext, add_request, cart_line, items};

#[tokio::test]
async fn test_sign_in_merges_guest_cart_once() {
    let ctx = TestContext::new();
    let _login = ctx.mock_login("tok_1");
    let merge = ctx.server.mock(|when, then| {
        when.method(POST)
            .path("/api/cart/merge")
            .header("authorization", "Bearer tok_1")
            .body_includes("\"p1\"");
        then.status(200)
            .json_body(items(json!([cart_line("srv-1", "p1", 500, 2)])));
    });
    let cart_fetch = ctx.server.mock(|when, then| {
        when.method(GET).path("/api/cart");
        then.status(200).json_body(items(json!([])));
    });
    let wishlist_fetch = ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });

    ctx.storefront.cart().add(add_request("p1", 500, 2)).await.unwrap();
    assert!(ctx.stored(keys::GUEST_CART).is_some());

    ctx.sign_in().await;
    ctx.storefront.reconcile().await;

    merge.assert_calls(1);
    // Merged collections adopt the merge response; empty ones are fetched
    cart_fetch.assert_calls(0);
    wishlist_fetch.assert_calls(1);

    assert!(ctx.stored(keys::GUEST_CART).is_none());
    let cart = ctx.storefront.cart().items().await;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].id.as_str(), "srv-1");
    assert!(
        ctx.storefront
            .notifications()
            .list()
            .iter()
            .any(|n| n.message.contains("added to your cart"))
    );
}

#[tokio::test]
async fn test_each_sign_in_is_a_new_merge_session() {
    let ctx = TestContext::new();
    let _login = ctx.mock_login("tok_1");
    let _logout = ctx.server.mock(|when, then| {
        when.method(POST).path("/api/auth/logout");
        then.status(200).json_body(json!({"success": true}));
    });
    let merge = ctx.server.mock(|when, then| {
        when.method(POST).path("/api/cart/merge");
        then.status(200)
            .json_body(items(json!([cart_line("srv-1", "p1", 500, 1)])));
    });
    let _wishlist = ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });

    ctx.storefront.cart().add(add_request("p1", 500, 1)).await.unwrap();
    ctx.sign_in().await;
    merge.assert_calls(1);

    ctx.storefront.auth().logout().await;
    ctx.storefront.reconcile().await;
    assert!(!ctx.storefront.auth().is_authenticated());
    assert!(ctx.storefront.cart().items().await.is_empty());

    ctx.storefront.cart().add(add_request("p2", 100, 1)).await.unwrap();
    ctx.sign_in().await;
    merge.assert_calls(2);
}

#[tokio::test]
async fn test_failed_merge_keeps_guest_cart_and_is_not_retried() {
    let ctx = TestContext::new();
    let _login = ctx.mock_login("tok_1");
    let merge = ctx.server.mock(|when, then| {
        when.method(POST).path("/api/cart/merge");
        then.status(503)
            .json_body(json!({"success": false, "error": "maintenance"}));
    });
    let _cart = ctx.server.mock(|when, then| {
        when.method(GET).path("/api/cart");
        then.status(200).json_body(items(json!([])));
    });
    let _wishlist = ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });

    ctx.storefront.cart().add(add_request("p1", 500, 1)).await.unwrap();
    ctx.sign_in().await;
    ctx.storefront.reconcile().await;

    merge.assert_calls(1);
    assert!(ctx.stored(keys::GUEST_CART).is_some());
    let errors: Vec<_> = ctx
        .storefront
        .notifications()
        .list()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].message.contains("maintenance"));
}

#[tokio::test]
async fn test_session_watcher_merges_after_login() {
    let ctx = TestContext::new();
    let _login = ctx.mock_login("tok_1");
    let merge = ctx.server.mock(|when, then| {
        when.method(POST).path("/api/cart/merge");
        then.status(200)
            .json_body(items(json!([cart_line("srv-1", "p1", 500, 1)])));
    });
    let _wishlist = ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });

    ctx.storefront.start(Arc::new(TracingSink));
    ctx.storefront.cart().add(add_request("p1", 500, 1)).await.unwrap();
    ctx.storefront
        .auth()
        .login("asha@example.com", "hunter22!")
        .await
        .unwrap();

    for _ in 0..50 {
        if ctx.stored(keys::GUEST_CART).is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    merge.assert_calls(1);
    assert!(ctx.stored(keys::GUEST_CART).is_none());
}
