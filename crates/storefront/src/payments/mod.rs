//! Payment gateway adapter.
//!
//! The rest of the storefront talks to the payment provider only through the
//! [`PaymentGateway`] trait:
//!
//! - [`PaymentGateway::create_intent`] asks the provider to prepare a charge
//!   and returns the client secret the browser needs to confirm it.
//! - [`PaymentGateway::verify_and_parse_event`] authenticates an incoming
//!   webhook and decodes it.
//!
//! Creating an intent never means the customer paid; only a verified
//! `payment_intent.succeeded` event does.

pub mod events;
pub mod fake;
pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use printshop_core::{CurrencyCode, OrderId};
use serde::Deserialize;
use thiserror::Error;

pub use events::{EventKind, PaymentIntentObject, WebhookEvent};
pub use fake::{FakeFailure, FakeGateway};
pub use signature::{SignatureError, WebhookVerifier};
pub use stripe::StripeClient;

/// Metadata key the order id travels under, in both directions.
pub const ORDER_ID_METADATA_KEY: &str = "orderId";

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Amount was zero or negative; no request was sent.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// The provider refused the request (4xx).
    #[error("payment provider rejected the request: {0}")]
    Rejected(String),

    /// The provider could not be reached or failed (5xx, timeout).
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    /// Webhook signature did not verify.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Webhook payload verified but could not be decoded.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// A request to create a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIntent {
    /// Amount in the currency's minor unit (öre, cents).
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    /// Echoed back in the intent's metadata.
    pub order_id: OrderId,
    /// Repeating a request with the same key returns the same intent.
    pub idempotency_key: String,
}

impl CreateIntent {
    /// Build a request keyed by the order id.
    #[must_use]
    pub fn for_order(order_id: OrderId, amount_minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount_minor,
            currency,
            order_id,
            idempotency_key: order_id.to_string(),
        }
    }
}

/// A payment intent as returned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// Capability to charge customers and receive authenticated outcomes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidAmount`] for non-positive amounts (checked
    /// before any network call), otherwise `Rejected` or `Unavailable`.
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, PaymentError>;

    /// Authenticate a webhook delivery and decode it.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidSignature`] on any authenticity failure,
    /// [`PaymentError::InvalidPayload`] if a verified body is not an event.
    fn verify_and_parse_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Shared pre-flight check for [`PaymentGateway::create_intent`].
///
/// # Errors
///
/// [`PaymentError::InvalidAmount`] if `amount_minor` is not positive.
pub fn ensure_positive_amount(amount_minor: i64) -> Result<(), PaymentError> {
    if amount_minor <= 0 {
        return Err(PaymentError::InvalidAmount(amount_minor));
    }
    Ok(())
}

/// Verify a webhook with `verifier` and decode the event.
///
/// # Errors
///
/// See [`PaymentGateway::verify_and_parse_event`].
pub fn verify_event(
    verifier: &WebhookVerifier,
    raw_body: &[u8],
    signature_header: &str,
) -> Result<WebhookEvent, PaymentError> {
    verifier.verify(raw_body, signature_header)?;
    serde_json::from_slice(raw_body).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
}
