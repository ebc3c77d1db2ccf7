//! Session restore, sign-out and the encrypted user mirror.

#![allow(clippy::unwrap_used)]

use httpmock::prelude::*;
use serde_json::json;

use storefront_sync_client::auth::SessionState;
use storefront_sync_client::storage::keys;
use storefront_sync_integration_tests::{TestContext, cart_line, items, ok, user_json};

#[tokio::test]
async fn test_restart_restores_session_and_account_cart() {
    let ctx = TestContext::new();
    ctx.mock_login("tok_1");
    let me = ctx.server.mock(|when, then| {
        when.method(GET)
            .path("/api/auth/me")
            .header("authorization", "Bearer tok_1");
        then.status(200).json_body(ok(user_json()));
    });
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/cart");
        then.status(200)
            .json_body(items(json!([cart_line("l1", "p1", 500, 1)])));
    });
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });

    ctx.sign_in().await;
    assert_eq!(ctx.stored(keys::AUTH_TOKEN).as_deref(), Some("tok_1"));

    let restarted = ctx.reopen(false);
    assert!(restarted.auth().restore().await.unwrap());
    restarted.reconcile().await;

    me.assert_calls(1);
    assert!(matches!(
        restarted.auth().session_state(),
        SessionState::Authenticated { .. }
    ));
    assert_eq!(restarted.cart().items().await.len(), 1);
}

#[tokio::test]
async fn test_rejected_token_falls_back_to_guest() {
    let ctx = TestContext::new();
    ctx.mock_login("tok_1");
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/auth/me");
        then.status(401)
            .json_body(json!({"success": false, "error": "expired"}));
    });
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/cart");
        then.status(200).json_body(items(json!([])));
    });
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });
    ctx.sign_in().await;

    let restarted = ctx.reopen(true);
    assert!(!restarted.auth().restore().await.unwrap());
    assert_eq!(restarted.auth().session_state(), SessionState::Guest);
    assert!(ctx.stored(keys::AUTH_TOKEN).is_none());
}

#[tokio::test]
async fn test_logout_clears_token_and_user_mirror() {
    let ctx = TestContext::new();
    let store_backed = ctx.reopen(true);
    ctx.mock_login("tok_1");
    let logout = ctx.server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/logout")
            .header("authorization", "Bearer tok_1");
        then.status(200).json_body(json!({"success": true}));
    });

    store_backed
        .auth()
        .login("asha@example.com", "hunter22!")
        .await
        .unwrap();
    assert!(ctx.stored(keys::USER_CACHE).is_some());

    store_backed.auth().logout().await;

    logout.assert();
    assert!(ctx.stored(keys::AUTH_TOKEN).is_none());
    assert!(ctx.stored(keys::USER_CACHE).is_none());
    assert!(store_backed.auth().current_user().await.is_none());
}

#[tokio::test]
async fn test_invalid_credentials_never_reach_server() {
    let ctx = TestContext::new();
    let login = ctx.mock_login("tok_1");

    let err = ctx
        .storefront
        .auth()
        .login("not-an-email", "hunter22!")
        .await
        .unwrap_err();

    login.assert_calls(0);
    assert!(!err.user_message().is_empty());
    assert!(!ctx.storefront.auth().is_authenticated());
}
