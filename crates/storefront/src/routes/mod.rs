//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness check
//! GET  /health/ready                        - Readiness check (order store)
//!
//! # Catalog
//! GET  /products                            - Product listing
//! GET  /products/{id}                       - Product detail
//!
//! # Orders
//! POST /orders/create-payment-intent        - Checkout (requires bearer token)
//! POST /orders/create-guest-payment-intent  - Guest checkout
//! GET  /orders                              - Caller's orders (requires bearer token)
//! GET  /orders/{orderId}                    - One owned order with product snapshots
//! GET  /orders/guest/{orderId}?email=       - Guest order lookup
//!
//! # Payments
//! POST /webhook                             - Stripe webhook (signed raw body)
//! ```

pub mod health;
pub mod orders;
pub mod products;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/create-payment-intent", post(orders::create_payment_intent))
        .route(
            "/create-guest-payment-intent",
            post(orders::create_guest_payment_intent),
        )
        .route("/guest/{order_id}", get(orders::show_guest))
        .route("/{order_id}", get(orders::show))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .route("/webhook", post(webhook::receive))
}
