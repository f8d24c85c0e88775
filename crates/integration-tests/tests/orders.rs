//! Integration tests for order lookup and the catalog.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use printshop_core::OrderId;
use printshop_integration_tests::TestApp;

// ============================================================================
// Customer orders
// ============================================================================

#[tokio::test]
async fn test_list_orders_newest_first() {
    let app = TestApp::new();
    let (first, _) = app.checkout(Some(1), None).await;
    app.checkout(Some(2), None).await;
    let (second, _) = app.checkout(Some(1), None).await;

    let resp = app.get("/orders", Some(&TestApp::token(1))).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["success"], true);
    let ids: Vec<_> = resp.body["orders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![second.to_string(), first.to_string()]);
}

#[tokio::test]
async fn test_list_orders_empty_for_new_customer() {
    let app = TestApp::new();

    let resp = app.get("/orders", Some(&TestApp::token(99))).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["orders"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_order_detail_includes_products() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.checkout(Some(4), None).await;

    let resp = app
        .get(&format!("/orders/{order_id}"), Some(&TestApp::token(4)))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let order = &resp.body["order"];
    assert_eq!(order["id"], order_id.to_string());
    assert_eq!(order["status"], "pending");
    assert_eq!(order["totalAmount"], 349);
    assert_eq!(order["paymentIntentId"], intent_id);
    assert_eq!(order["items"][0]["productRef"], 1);
    assert_eq!(order["items"][0]["product"]["name"], "Midnight Harbour");
    assert_eq!(
        order["items"][1]["product"]["mainImage"],
        "/images/prints/birch-study-4.jpg"
    );
}

#[tokio::test]
async fn test_other_customers_order_is_not_found() {
    let app = TestApp::new();
    let (order_id, _) = app.checkout(Some(5), None).await;

    let resp = app
        .get(&format!("/orders/{order_id}"), Some(&TestApp::token(6)))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.body["success"], false);

    let resp = app.get(&format!("/orders/{order_id}"), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_and_malformed_order_ids() {
    let app = TestApp::new();
    let token = TestApp::token(1);

    let resp = app
        .get(&format!("/orders/{}", OrderId::generate()), Some(&token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.get("/orders/not-a-uuid", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Guest lookup
// ============================================================================

#[tokio::test]
async fn test_guest_lookup_matches_email_case_insensitively() {
    let app = TestApp::new();
    let (order_id, _) = app.checkout(None, Some("guest@example.se")).await;

    let resp = app
        .get(
            &format!("/orders/guest/{order_id}?email=GUEST@example.SE"),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["order"]["id"], order_id.to_string());
    assert!(resp.body["order"]["user"].is_null());
}

#[tokio::test]
async fn test_guest_lookup_rejects_wrong_email() {
    let app = TestApp::new();
    let (order_id, _) = app.checkout(None, Some("guest@example.se")).await;

    let resp = app
        .get(
            &format!("/orders/guest/{order_id}?email=someone@example.se"),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.get(&format!("/orders/guest/{order_id}"), None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guest_lookup_does_not_expose_customer_orders() {
    let app = TestApp::new();
    let (order_id, _) = app.checkout(Some(8), Some("astrid@example.se")).await;

    let resp = app
        .get(
            &format!("/orders/guest/{order_id}?email=astrid@example.se"),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Catalog and health
// ============================================================================

#[tokio::test]
async fn test_product_endpoints() {
    let app = TestApp::new();

    let resp = app.get("/products", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["products"].as_array().unwrap().len(), 2);

    let resp = app.get("/products/2", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["product"]["name"], "Birch Study No. 4");
    assert_eq!(resp.body["product"]["price"], 50);

    assert_eq!(
        app.get("/products/404", None).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/products/abc", None).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();

    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/health/ready", None).await.status, StatusCode::OK);

    app.orders.set_unavailable(true);
    assert_eq!(
        app.get("/health/ready", None).await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );
}
