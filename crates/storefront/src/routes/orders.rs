//! Order route handlers.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use printshop_core::{CurrencyCode, Email, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{FieldError, Order, ProductSummary, ShippingAddress};
use crate::services::{CheckoutIdentity, CheckoutRequest, CheckoutSession};
use crate::state::AppState;

/// Response for both payment-intent endpoints.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    #[serde(flatten)]
    pub session: CheckoutSession,
}

/// Response for the order listing.
#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// Response for a single order.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: OrderView,
}

/// An order line with the product it refers to, if it still exists.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product_ref: ProductId,
    pub quantity: u32,
    pub price: i64,
    pub product: Option<ProductSummary>,
}

/// An order as shown on its detail page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user: Option<UserId>,
    pub items: Vec<OrderItemView>,
    pub shipping_address: ShippingAddress,
    pub total_amount: i64,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query for the guest lookup.
#[derive(Debug, Deserialize)]
pub struct GuestLookupQuery {
    pub email: Option<String>,
}

/// Create a payment intent for the authenticated caller's cart.
#[instrument(skip(state, payload), fields(user_id = %user.id))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let Json(request) = payload?;
    let session = state
        .checkout()
        .checkout(CheckoutIdentity::Customer(user.id), request)
        .await?;
    Ok(Json(CheckoutResponse {
        success: true,
        session,
    }))
}

/// Create a payment intent for a guest cart.
#[instrument(skip(state, payload))]
pub async fn create_guest_payment_intent(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let Json(request) = payload?;
    let session = state
        .checkout()
        .checkout(CheckoutIdentity::Guest, request)
        .await?;
    Ok(Json(CheckoutResponse {
        success: true,
        session,
    }))
}

/// List the caller's orders, newest first.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrdersResponse>> {
    let orders = state.orders().find_by_user(user.id).await?;
    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

/// Show one of the caller's orders.
///
/// Orders belonging to someone else are reported as missing.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let order = load_order(&state, &order_id).await?;
    if !order.is_owned_by(user.id) {
        return Err(order_not_found());
    }
    respond_with_detail(&state, order).await
}

/// Show a guest order to whoever knows its id and contact email.
#[instrument(skip(state, query))]
pub async fn show_guest(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<GuestLookupQuery>,
) -> Result<Json<OrderResponse>> {
    let raw_email = query
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::Validation(vec![FieldError::new("email", "email is required")]))?;
    let email = Email::parse(raw_email.trim()).map_err(|_| order_not_found())?;

    let order = load_order(&state, &order_id).await?;
    if !order.is_guest_contact(&email) {
        return Err(order_not_found());
    }
    respond_with_detail(&state, order).await
}

fn order_not_found() -> AppError {
    AppError::NotFound("order".to_string())
}

async fn load_order(state: &AppState, raw_id: &str) -> Result<Order> {
    let order_id: OrderId = raw_id.parse().map_err(|_| order_not_found())?;
    state
        .orders()
        .find_by_id(order_id)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => order_not_found(),
            other => other,
        })
}

async fn respond_with_detail(state: &AppState, order: Order) -> Result<Json<OrderResponse>> {
    let ids: Vec<ProductId> = order.items.iter().map(|i| i.product_id).collect();
    let products: HashMap<ProductId, ProductSummary> = state
        .catalog()
        .get_many(&ids)
        .await?
        .iter()
        .map(|p| (p.id, ProductSummary::from(p)))
        .collect();

    let items = order
        .items
        .iter()
        .map(|item| OrderItemView {
            product_ref: item.product_id,
            quantity: item.quantity,
            price: item.unit_price,
            product: products.get(&item.product_id).cloned(),
        })
        .collect();

    Ok(Json(OrderResponse {
        success: true,
        order: OrderView {
            id: order.id,
            user: order.user,
            items,
            shipping_address: order.shipping_address,
            total_amount: order.total_amount,
            currency: order.currency,
            status: order.status,
            payment_intent_id: order.payment_intent_id,
            created_at: order.created_at,
        },
    }))
}
