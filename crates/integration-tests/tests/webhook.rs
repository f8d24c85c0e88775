//! Integration tests for Stripe webhook reconciliation.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use printshop_core::{OrderId, OrderStatus};
use printshop_integration_tests::{TestApp, payment_succeeded};
use printshop_storefront::store::OrderStore;
use serde_json::json;

// ============================================================================
// Payment succeeded
// ============================================================================

#[tokio::test]
async fn test_succeeded_payment_marks_order_paid() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(None, Some("guest@example.se")).await;

    let resp = app.deliver(&payment_succeeded(&intent_id, Some(order_id))).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!({ "received": true }));
    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Paid
    );
}

#[tokio::test]
async fn test_duplicate_deliveries_are_acknowledged() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(Some(2), None).await;
    let body = payment_succeeded(&intent_id, Some(order_id));

    for _ in 0..2 {
        let resp = app.deliver(&body).await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let order = app.orders.find_by_id(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_late_delivery_does_not_regress_status() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(Some(2), None).await;
    app.orders.set_status(order_id, OrderStatus::Paid).await.unwrap();
    app.orders
        .set_status(order_id, OrderStatus::Shipped)
        .await
        .unwrap();

    let resp = app.deliver(&payment_succeeded(&intent_id, None)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Shipped
    );
}

#[tokio::test]
async fn test_unknown_intent_is_acknowledged() {
    let app = TestApp::new();

    let resp = app
        .deliver(&payment_succeeded("pi_unknown", Some(OrderId::generate())))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(app.orders.is_empty().await);
}

#[tokio::test]
async fn test_other_event_types_are_ignored() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(None, Some("guest@example.se")).await;
    let body = serde_json::to_vec(&json!({
        "id": "evt_failed",
        "type": "payment_intent.payment_failed",
        "data": { "object": { "id": intent_id, "metadata": { "orderId": order_id.to_string() } } }
    }))
    .unwrap();

    let resp = app.deliver(&body).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_store_outage_is_server_error_for_redelivery() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(None, Some("guest@example.se")).await;
    let body = payment_succeeded(&intent_id, Some(order_id));

    app.orders.set_unavailable(true);
    let resp = app.deliver(&body).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.body["success"], false);
    assert!(resp.body["received"].is_null());

    app.orders.set_unavailable(false);
    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Pending
    );

    let resp = app.deliver(&body).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Paid
    );
}

// ============================================================================
// Authenticity
// ============================================================================

#[tokio::test]
async fn test_bad_signature_changes_nothing() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(None, Some("guest@example.se")).await;
    let body = payment_succeeded(&intent_id, Some(order_id));

    let forged = format!(
        "t={},v1={}",
        chrono::Utc::now().timestamp(),
        "0".repeat(64)
    );
    let resp = app.post_webhook(&body, Some(&forged)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["success"], false);

    let resp = app.post_webhook(&body, None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(None, Some("guest@example.se")).await;
    let signed = payment_succeeded("pi_other", None);
    let signature = app.gateway.sign(&signed);

    let tampered = payment_succeeded(&intent_id, Some(order_id));
    let resp = app.post_webhook(&tampered, Some(&signature)).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.orders.find_by_id(order_id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_authentic_but_undecodable_event_is_bad_request() {
    let app = TestApp::new();
    let body = serde_json::to_vec(&json!({
        "id": "evt_broken",
        "type": "payment_intent.succeeded",
        "data": { "object": { "amount": 34_900 } }
    }))
    .unwrap();

    let resp = app.deliver(&body).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], "Validation failed");
    assert_eq!(resp.body["fields"][0]["field"], "body");
}
