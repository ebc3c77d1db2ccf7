//! Notification queue bounds and the server inbox.

#![allow(clippy::unwrap_used)]

use httpmock::prelude::*;
use serde_json::json;

use storefront_sync_core::NotificationId;
use storefront_sync_core::notification::{Channel, Notification, Priority};
use storefront_sync_integration_tests::{TestContext, items};

#[tokio::test]
async fn test_history_is_capped_and_drops_oldest_first() {
    let ctx = TestContext::new();
    let center = ctx.storefront.notifications();

    for i in 0..60 {
        let priority = if i % 7 == 0 {
            Priority::Urgent
        } else {
            Priority::Low
        };
        center.notify(Notification::info(format!("n{i}")).with_priority(priority));
    }

    let list = center.list();
    assert_eq!(list.len(), 50);
    assert_eq!(list.first().unwrap().message, "n59");
    assert_eq!(list.last().unwrap().message, "n10");

    let mut toasts = Vec::new();
    while let Some(toast) = center.next_toast() {
        toasts.push(toast.message);
    }
    assert_eq!(toasts.first().map(String::as_str), Some("n10"));
    assert_eq!(toasts.len(), 50);
}

#[tokio::test]
async fn test_inbox_round_trip_for_signed_in_shopper() {
    let ctx = TestContext::new();
    ctx.mock_login("tok_1");
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/cart");
        then.status(200).json_body(items(json!([])));
    });
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/wishlist");
        then.status(200).json_body(items(json!([])));
    });
    ctx.server.mock(|when, then| {
        when.method(GET).path("/api/notifications");
        then.status(200).json_body(items(json!([
            {"id": "n1", "type": "info", "message": "Order shipped",
             "created_at": "2026-01-02T10:00:00Z"},
            {"id": "n2", "type": "success", "message": "Refund issued",
             "created_at": "2026-01-03T10:00:00Z"}
        ])));
    });
    let read = ctx.server.mock(|when, then| {
        when.method(PUT).path("/api/notifications/n1/read");
        then.status(200).json_body(json!({"success": true}));
    });
    let created = ctx.server.mock(|when, then| {
        when.method(POST)
            .path("/api/notifications")
            .body_includes("Back soon");
        then.status(200).json_body(json!({"success": true, "data": {
            "id": "n3", "type": "info", "message": "Back soon",
            "channel": "inbox", "created_at": "2026-01-04T10:00:00Z"
        }}));
    });
    ctx.sign_in().await;

    let center = ctx.storefront.notifications();
    assert_eq!(center.fetch_inbox().await.unwrap(), 2);
    assert_eq!(center.unread_count(), 2);
    assert_eq!(center.list()[0].message, "Refund issued");

    center.mark_read(&NotificationId::new("n1")).await.unwrap();
    read.assert();
    assert_eq!(center.unread_count(), 1);

    let toasts_before = center.pending_toasts();
    center
        .push(Notification::info("Back soon").with_channel(Channel::Inbox))
        .await
        .unwrap();
    created.assert();
    assert_eq!(center.list()[0].id.as_str(), "n3");
    assert_eq!(center.pending_toasts(), toasts_before);
}
