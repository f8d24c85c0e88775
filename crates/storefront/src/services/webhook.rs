//! Payment webhook reconciliation.
//!
//! A verified `payment_intent.succeeded` event moves its order to `paid`.
//! Every other event type is acknowledged and ignored. Deliveries may repeat
//! or arrive out of order; reconciling an order that is already paid (or
//! further along) changes nothing.

use printshop_core::{Money, OrderId, OrderStatus};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::db::RepositoryError;
use crate::models::Order;
use crate::payments::{EventKind, PaymentError, PaymentGateway, PaymentIntentObject};
use crate::store::{OrderStore, StatusChange};

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order moved from `pending` to `paid`.
    MarkedPaid(OrderId),
    /// The order had already reached `paid`; nothing was written.
    AlreadyPaid(OrderId),
    /// The event type is not acted on.
    Ignored(String),
    /// No order matches the payment intent.
    UnknownOrder(String),
}

/// Errors from [`WebhookReconciler::reconcile`].
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery failed authentication.
    #[error(transparent)]
    Signature(PaymentError),

    /// The delivery is authentic but its body could not be decoded.
    #[error(transparent)]
    Payload(PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Applies payment events to orders.
pub struct WebhookReconciler<'a> {
    orders: &'a dyn OrderStore,
    gateway: &'a dyn PaymentGateway,
}

impl<'a> WebhookReconciler<'a> {
    /// Create a new reconciler.
    #[must_use]
    pub const fn new(orders: &'a dyn OrderStore, gateway: &'a dyn PaymentGateway) -> Self {
        Self { orders, gateway }
    }

    /// Verify a raw delivery and apply it.
    ///
    /// # Errors
    ///
    /// [`WebhookError::Signature`] if the delivery is not authentic and
    /// [`WebhookError::Payload`] if it is authentic but undecodable (nothing
    /// is written in either case). [`WebhookError::Repository`] if the store
    /// fails; the gateway redelivers on the resulting server error.
    #[instrument(skip_all, fields(event_id, event_type))]
    pub async fn reconcile(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let event = self
            .gateway
            .verify_and_parse_event(raw_body, signature_header)
            .map_err(rejected_delivery)?;

        let span = tracing::Span::current();
        span.record("event_id", event.id.as_str());
        span.record("event_type", event.event_type.as_str());

        let intent = match event.kind().map_err(rejected_delivery)? {
            EventKind::PaymentSucceeded(intent) => intent,
            EventKind::Other(event_type) => {
                info!("ignoring webhook event");
                return Ok(WebhookOutcome::Ignored(event_type));
            }
        };

        let Some(order) = self.resolve_order(&intent).await? else {
            warn!(payment_intent_id = %intent.id, "no order for succeeded payment intent");
            return Ok(WebhookOutcome::UnknownOrder(intent.id));
        };

        if !charged_order_total(&order, &intent) {
            warn!(
                order_id = %order.id,
                payment_intent_id = %intent.id,
                intent_amount = intent.amount,
                intent_currency = %intent.currency,
                total_amount = order.total_amount,
                currency = %order.currency,
                "payment intent amount does not match order total"
            );
        }

        match self.orders.set_status(order.id, OrderStatus::Paid).await? {
            StatusChange::Updated(order) => {
                info!(order_id = %order.id, payment_intent_id = %intent.id, "order marked paid");
                Ok(WebhookOutcome::MarkedPaid(order.id))
            }
            StatusChange::Unchanged(order) => {
                info!(order_id = %order.id, status = %order.status, "order already paid");
                Ok(WebhookOutcome::AlreadyPaid(order.id))
            }
        }
    }

    /// Find the order by attached intent id, falling back to the order id
    /// carried in the intent metadata.
    async fn resolve_order(
        &self,
        intent: &PaymentIntentObject,
    ) -> Result<Option<Order>, RepositoryError> {
        match self.orders.find_by_payment_intent(&intent.id).await {
            Ok(order) => return Ok(Some(order)),
            Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let Some(order_id) = intent.order_id() else {
            return Ok(None);
        };
        match self.orders.find_by_id(order_id).await {
            Ok(order) => Ok(Some(order)),
            Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn rejected_delivery(err: PaymentError) -> WebhookError {
    if matches!(err, PaymentError::InvalidPayload(_)) {
        warn!(error = %err, "undecodable webhook delivery");
        WebhookError::Payload(err)
    } else {
        warn!(security_event = true, error = %err, "rejected webhook delivery");
        WebhookError::Signature(err)
    }
}

/// Whether `intent` charged exactly the order total in the order's currency.
fn charged_order_total(order: &Order, intent: &PaymentIntentObject) -> bool {
    Money::new(order.total_amount, order.currency)
        .to_minor_units()
        .is_ok_and(|minor| minor == intent.amount)
        && intent
            .currency
            .eq_ignore_ascii_case(order.currency.gateway_code())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::models::order::fixtures::draft;
    use crate::payments::{FakeGateway, SignatureError, WebhookVerifier};
    use crate::store::MemoryOrderStore;

    fn gateway() -> FakeGateway {
        FakeGateway::new(WebhookVerifier::new(
            SecretString::from("whsec_Jf83kLq02XmZp7Rt5YvB1nCw9GdH"),
            Duration::from_secs(300),
        ))
    }

    fn succeeded(intent_id: &str, order_id: Option<OrderId>) -> Vec<u8> {
        let metadata = order_id.map_or_else(
            || serde_json::json!({}),
            |id| serde_json::json!({ "orderId": id.to_string() }),
        );
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "object": "event",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": intent_id,
                "object": "payment_intent",
                "amount": 34900,
                "currency": "sek",
                "status": "succeeded",
                "metadata": metadata,
            }}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_marks_order_paid_once() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let order = orders.create(draft(None)).await.unwrap();
        orders.attach_payment_intent(order.id, "pi_1").await.unwrap();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = succeeded("pi_1", Some(order.id));
        let header = gateway.sign(&body);

        assert_eq!(
            reconciler.reconcile(&body, &header).await.unwrap(),
            WebhookOutcome::MarkedPaid(order.id)
        );
        assert_eq!(
            reconciler.reconcile(&body, &header).await.unwrap(),
            WebhookOutcome::AlreadyPaid(order.id)
        );
        assert_eq!(
            orders.find_by_id(order.id).await.unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_metadata_order_id() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let order = orders.create(draft(None)).await.unwrap();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = succeeded("pi_never_attached", Some(order.id));
        let outcome = reconciler
            .reconcile(&body, &gateway.sign(&body))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::MarkedPaid(order.id));
    }

    #[tokio::test]
    async fn test_unknown_order_is_acknowledged() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = succeeded("pi_ghost", Some(OrderId::generate()));
        let outcome = reconciler
            .reconcile(&body, &gateway.sign(&body))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownOrder("pi_ghost".to_string()));
    }

    #[tokio::test]
    async fn test_bad_signature_writes_nothing() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let order = orders.create(draft(None)).await.unwrap();
        orders.attach_payment_intent(order.id, "pi_1").await.unwrap();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = succeeded("pi_1", Some(order.id));
        let forged = format!("t={},v1={}", chrono::Utc::now().timestamp(), "ab".repeat(32));

        let err = reconciler.reconcile(&body, &forged).await.unwrap_err();
        assert!(matches!(
            err,
            WebhookError::Signature(PaymentError::InvalidSignature(SignatureError::Mismatch))
        ));
        assert_eq!(
            orders.find_by_id(order.id).await.unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_other_events_ignored() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = br#"{"id":"evt_2","type":"payment_intent.created","data":{"object":{"id":"pi_1"}}}"#;
        let outcome = reconciler
            .reconcile(body, &gateway.sign(body))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored("payment_intent.created".to_string())
        );
    }

    #[tokio::test]
    async fn test_late_delivery_after_shipping_is_noop() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let order = orders.create(draft(None)).await.unwrap();
        orders.attach_payment_intent(order.id, "pi_1").await.unwrap();
        orders.set_status(order.id, OrderStatus::Paid).await.unwrap();
        orders.set_status(order.id, OrderStatus::Shipped).await.unwrap();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = succeeded("pi_1", None);
        let outcome = reconciler
            .reconcile(&body, &gateway.sign(&body))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyPaid(order.id));
        assert_eq!(
            orders.find_by_id(order.id).await.unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn test_undecodable_intent_is_payload_error() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = br#"{"id":"evt_3","type":"payment_intent.succeeded","data":{"object":{"amount":1}}}"#;
        let err = reconciler
            .reconcile(body, &gateway.sign(body))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WebhookError::Payload(PaymentError::InvalidPayload(_))
        ));

        let body = b"not json";
        let err = reconciler
            .reconcile(body, &gateway.sign(body))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Payload(_)));
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_for_redelivery() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let order = orders.create(draft(None)).await.unwrap();
        orders.attach_payment_intent(order.id, "pi_1").await.unwrap();
        let reconciler = WebhookReconciler::new(&orders, &gateway);
        let body = succeeded("pi_1", Some(order.id));
        let header = gateway.sign(&body);

        orders.set_unavailable(true);
        let err = reconciler.reconcile(&body, &header).await.unwrap_err();
        assert!(matches!(err, WebhookError::Repository(_)));

        orders.set_unavailable(false);
        assert_eq!(
            reconciler.reconcile(&body, &header).await.unwrap(),
            WebhookOutcome::MarkedPaid(order.id)
        );
    }

    #[tokio::test]
    async fn test_charged_order_total() {
        let orders = MemoryOrderStore::new();
        let order = orders.create(draft(None)).await.unwrap();
        let intent = |amount: i64, currency: &str| PaymentIntentObject {
            id: "pi_1".to_string(),
            amount,
            currency: currency.to_string(),
            status: "succeeded".to_string(),
            metadata: std::collections::HashMap::new(),
        };

        assert!(charged_order_total(&order, &intent(34_900, "sek")));
        assert!(charged_order_total(&order, &intent(34_900, "SEK")));
        assert!(!charged_order_total(&order, &intent(349, "sek")));
        assert!(!charged_order_total(&order, &intent(34_900, "eur")));
    }

    #[tokio::test]
    async fn test_amount_mismatch_still_marks_paid() {
        let orders = MemoryOrderStore::new();
        let gateway = gateway();
        let order = orders.create(draft(None)).await.unwrap();
        let reconciler = WebhookReconciler::new(&orders, &gateway);

        let body = serde_json::to_vec(&serde_json::json!({
            "id": "evt_4",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_short",
                "amount": 100,
                "currency": "sek",
                "metadata": { "orderId": order.id.to_string() },
            }}
        }))
        .unwrap();
        let outcome = reconciler
            .reconcile(&body, &gateway.sign(&body))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::MarkedPaid(order.id));
    }
}
