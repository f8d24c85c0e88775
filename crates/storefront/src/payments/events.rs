//! Webhook event payloads.

use std::collections::HashMap;

use printshop_core::OrderId;
use serde::Deserialize;

use super::{ORDER_ID_METADATA_KEY, PaymentError};

/// Event type for a completed payment.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// A decoded webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// The `data` member of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The API object the event is about; shape depends on `type`.
    pub object: serde_json::Value,
}

/// The subset of a payment intent the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntentObject {
    /// The order id echoed back from creation metadata, if well-formed.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get(ORDER_ID_METADATA_KEY)
            .and_then(|raw| raw.parse().ok())
    }
}

/// What an event means to the storefront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PaymentSucceeded(PaymentIntentObject),
    /// Any event type the storefront does not act on.
    Other(String),
}

impl WebhookEvent {
    /// Classify the event.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidPayload`] if a `payment_intent.succeeded`
    /// event does not carry a payment intent.
    pub fn kind(&self) -> Result<EventKind, PaymentError> {
        if self.event_type != PAYMENT_INTENT_SUCCEEDED {
            return Ok(EventKind::Other(self.event_type.clone()));
        }
        serde_json::from_value::<PaymentIntentObject>(self.data.object.clone())
            .map(EventKind::PaymentSucceeded)
            .map_err(|e| PaymentError::InvalidPayload(format!("event {}: {e}", self.id)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "object": "event",
            "type": event_type,
            "data": { "object": object },
        }))
        .unwrap()
    }

    #[test]
    fn test_payment_succeeded() {
        let order_id = OrderId::generate();
        let evt = event(
            PAYMENT_INTENT_SUCCEEDED,
            serde_json::json!({
                "id": "pi_123",
                "object": "payment_intent",
                "amount": 34900,
                "currency": "sek",
                "status": "succeeded",
                "metadata": { "orderId": order_id.to_string() },
            }),
        );

        let EventKind::PaymentSucceeded(intent) = evt.kind().unwrap() else {
            panic!("expected payment succeeded");
        };
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.amount, 34900);
        assert_eq!(intent.order_id(), Some(order_id));
    }

    #[test]
    fn test_other_events_are_not_parsed() {
        let evt = event("charge.refunded", serde_json::json!({ "id": "ch_1" }));
        assert_eq!(
            evt.kind().unwrap(),
            EventKind::Other("charge.refunded".to_string())
        );
    }

    #[test]
    fn test_succeeded_without_intent_is_invalid() {
        let evt = event(PAYMENT_INTENT_SUCCEEDED, serde_json::json!({ "amount": 1 }));
        assert!(matches!(evt.kind(), Err(PaymentError::InvalidPayload(_))));
    }

    #[test]
    fn test_malformed_order_metadata_is_ignored() {
        let intent = PaymentIntentObject {
            id: "pi_1".to_string(),
            amount: 100,
            currency: "sek".to_string(),
            status: "succeeded".to_string(),
            metadata: HashMap::from([("orderId".to_string(), "64f1c2-mongo".to_string())]),
        };
        assert_eq!(intent.order_id(), None);
    }
}
