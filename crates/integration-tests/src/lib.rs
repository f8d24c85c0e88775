//! Integration tests for the print shop storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p printshop-integration-tests
//! ```
//!
//! The suites drive the real router from [`printshop_storefront::app`]
//! in-process with `tower::ServiceExt::oneshot`. Orders and products live in
//! memory and payments go to a recording [`FakeGateway`] that verifies
//! webhooks with the production signature code, so no database or network
//! is needed.
//!
//! # Test Categories
//!
//! - `checkout` - Payment-intent endpoints
//! - `orders` - Order listing and lookup
//! - `webhook` - Stripe webhook reconciliation

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use printshop_core::{OrderId, ProductId, UserId};
use printshop_storefront::config::StorefrontConfig;
use printshop_storefront::models::Product;
use printshop_storefront::payments::{FakeGateway, WebhookVerifier};
use printshop_storefront::services::Claims;
use printshop_storefront::state::AppState;
use printshop_storefront::store::{MemoryOrderStore, MemoryProductCatalog};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "q8F!t2Lz#9vR@c4Wm$7nK0pY^s3Xb6Hj";
pub const WEBHOOK_SECRET: &str = "whsec_Jf83kLq02XmZp7Rt5YvB1nCw9GdH";

/// Storefront configuration used by every test app.
///
/// Flat shipping fee of 49 SEK.
///
/// # Panics
///
/// Panics if the fixed values stop passing configuration validation.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    let vars = HashMap::from([
        ("STOREFRONT_DATABASE_URL", "postgres://localhost/printshop_test"),
        ("STRIPE_SECRET_KEY", "sk_test_51HqLyjWDarjtT1zdp7dcXfR3kQ9mZ"),
        ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("STOREFRONT_JWT_SECRET", JWT_SECRET),
        ("STOREFRONT_SHIPPING_FEE", "49"),
        ("STOREFRONT_CURRENCY", "SEK"),
    ]);
    StorefrontConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
        .expect("test configuration is valid")
}

/// The two prints every test app's catalog holds.
#[must_use]
pub fn catalog() -> Vec<Product> {
    vec![
        Product {
            id: ProductId::new(1),
            name: "Midnight Harbour".to_string(),
            category: "Landscapes".to_string(),
            price: 100,
            description: "Giclée print".to_string(),
            main_image: "/images/prints/midnight-harbour.jpg".to_string(),
            additional_images: vec![],
            stock: 10,
        },
        Product {
            id: ProductId::new(2),
            name: "Birch Study No. 4".to_string(),
            category: "Botanical".to_string(),
            price: 50,
            description: "Pigment print".to_string(),
            main_image: "/images/prints/birch-study-4.jpg".to_string(),
            additional_images: vec![],
            stock: 5,
        },
    ]
}

/// A checkout body for `[{id 1, 100 × 2}, {id 2, 50 × 1}]`.
#[must_use]
pub fn cart_body(email: Option<&str>) -> Value {
    json!({
        "items": [
            { "productRef": 1, "quantity": 2, "price": 100 },
            { "productRef": 2, "quantity": 1, "price": 50 },
        ],
        "shippingAddress": {
            "firstName": "Astrid",
            "lastName": "Lindqvist",
            "street": "Storgatan 12",
            "zipCode": "411 38",
            "city": "Göteborg",
            "country": "Sweden",
            "phone": "+46 31 123 45 67",
            "email": email,
        }
    })
}

/// A `payment_intent.succeeded` event body.
///
/// # Panics
///
/// Never in practice; serializing a `json!` value cannot fail.
#[must_use]
pub fn payment_succeeded(payment_intent_id: &str, order_id: Option<OrderId>) -> Vec<u8> {
    let metadata = order_id.map_or_else(|| json!({}), |id| json!({ "orderId": id.to_string() }));
    serde_json::to_vec(&json!({
        "id": format!("evt_{payment_intent_id}"),
        "object": "event",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": payment_intent_id,
            "object": "payment_intent",
            "amount": 34_900,
            "currency": "sek",
            "status": "succeeded",
            "metadata": metadata,
        }}
    }))
    .expect("event serializes")
}

/// A response with its body decoded as JSON (`Value::Null` when not JSON).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// An in-process storefront.
pub struct TestApp {
    pub orders: Arc<MemoryOrderStore>,
    pub gateway: Arc<FakeGateway>,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build an app with an empty order store and [`catalog`].
    #[must_use]
    pub fn new() -> Self {
        let config = test_config();
        let orders = Arc::new(MemoryOrderStore::new());
        let gateway = Arc::new(FakeGateway::new(WebhookVerifier::new(
            config.stripe.webhook_secret.clone(),
            config.stripe.webhook_tolerance,
        )));
        let state = AppState::new(
            config,
            orders.clone(),
            Arc::new(MemoryProductCatalog::new(catalog())),
            gateway.clone(),
        );

        Self {
            orders,
            gateway,
            router: printshop_storefront::app(state),
        }
    }

    /// Mint a bearer token for `user`, valid for an hour.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails.
    #[must_use]
    pub fn token(user: i32) -> String {
        let claims = Claims {
            user_id: UserId::new(user),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("token encodes")
    }

    /// Send a request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the router errors.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        TestResponse {
            status,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }

    /// `GET uri`, optionally with a bearer token.
    ///
    /// # Panics
    ///
    /// See [`TestApp::send`].
    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).expect("request builds"))
            .await
    }

    /// `POST uri` with a JSON body, optionally with a bearer token.
    ///
    /// # Panics
    ///
    /// See [`TestApp::send`].
    pub async fn post_json(&self, uri: &str, body: &Value, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request builds"))
            .await
    }

    /// `POST /webhook` with a raw body and optional signature header.
    ///
    /// # Panics
    ///
    /// See [`TestApp::send`].
    pub async fn post_webhook(&self, body: &[u8], signature: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }
        self.send(builder.body(Body::from(body.to_vec())).expect("request builds"))
            .await
    }

    /// `POST /webhook` with a correctly signed body.
    pub async fn deliver(&self, body: &[u8]) -> TestResponse {
        let signature = self.gateway.sign(body);
        self.post_webhook(body, Some(&signature)).await
    }

    /// Check out as `user` (or as a guest) and return the new order id and
    /// the payment intent id issued for it.
    ///
    /// # Panics
    ///
    /// Panics if checkout does not succeed.
    pub async fn checkout(&self, user: Option<i32>, email: Option<&str>) -> (OrderId, String) {
        let response = match user {
            Some(user) => {
                let token = Self::token(user);
                self.post_json(
                    "/orders/create-payment-intent",
                    &cart_body(email),
                    Some(&token),
                )
                .await
            }
            None => {
                self.post_json("/orders/create-guest-payment-intent", &cart_body(email), None)
                    .await
            }
        };
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

        let order_id: OrderId = response.body["orderId"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .expect("orderId in response");
        let intent = self
            .gateway
            .intents()
            .into_iter()
            .find(|i| response.body["clientSecret"] == i.client_secret.as_str())
            .expect("intent was issued");
        (order_id, intent.id)
    }
}
