//! Payment webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload,
//! so no JSON extractor may run before verification.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Header carrying the Stripe signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Acknowledgement sent for every authentic delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Receive a Stripe webhook.
///
/// Any authentic delivery is acknowledged with 200, including event types
/// that are ignored and intents no order matches, so the provider does not
/// keep retrying them.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
    else {
        warn!(security_event = true, "webhook delivery without signature header");
        return Err(AppError::Signature("missing signature header".to_string()));
    };

    let outcome = state.reconciler().reconcile(&body, signature).await?;
    tracing::debug!(?outcome, "webhook processed");

    Ok(Json(WebhookAck { received: true }))
}
