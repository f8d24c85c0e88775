//! In-process [`PaymentGateway`] for tests and local development.
//!
//! Intents are minted locally and every request is recorded. Webhooks are
//! verified with a real [`WebhookVerifier`], so a test can sign a payload
//! with [`FakeGateway::sign`] and push it through the same code path Stripe
//! deliveries take.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{
    CreateIntent, PaymentError, PaymentGateway, PaymentIntent, WebhookEvent, WebhookVerifier,
    ensure_positive_amount, verify_event,
};

/// Failure the fake should report from `create_intent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    /// Behave like a 4xx from the provider.
    Rejected,
    /// Behave like a 5xx or network failure.
    Unavailable,
}

/// A recording, locally-signing payment gateway.
#[derive(Debug)]
pub struct FakeGateway {
    verifier: WebhookVerifier,
    issued: Mutex<Vec<(CreateIntent, PaymentIntent)>>,
    failure: Mutex<Option<FakeFailure>>,
    next_id: AtomicU64,
}

impl FakeGateway {
    /// Create a fake that verifies webhooks with `verifier`.
    #[must_use]
    pub const fn new(verifier: WebhookVerifier) -> Self {
        Self {
            verifier,
            issued: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Make `create_intent` fail (or succeed again with `None`).
    pub fn fail_with(&self, failure: Option<FakeFailure>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = failure;
    }

    /// Every accepted intent request, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CreateIntent> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// Every intent handed out, oldest first.
    #[must_use]
    pub fn intents(&self) -> Vec<PaymentIntent> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, intent)| intent.clone())
            .collect()
    }

    /// Produce a `Stripe-Signature` header for `payload`, timestamped now.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> String {
        self.verifier
            .signature_header(payload, chrono::Utc::now().timestamp())
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, PaymentError> {
        ensure_positive_amount(request.amount_minor)?;

        match *self.failure.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(FakeFailure::Rejected) => {
                return Err(PaymentError::Rejected("card_error: declined".to_string()));
            }
            Some(FakeFailure::Unavailable) => {
                return Err(PaymentError::Unavailable("HTTP 503".to_string()));
            }
            None => {}
        }

        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, intent)) = issued
            .iter()
            .find(|(prior, _)| prior.idempotency_key == request.idempotency_key)
        {
            return Ok(intent.clone());
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("pi_fake_{n}");
        let intent = PaymentIntent {
            client_secret: format!("{id}_secret_{n}"),
            id,
            amount: request.amount_minor,
            currency: request.currency.gateway_code().to_string(),
            status: "requires_payment_method".to_string(),
        };
        issued.push((request, intent.clone()));
        Ok(intent)
    }

    fn verify_and_parse_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_event(&self.verifier, raw_body, signature_header)
    }
}
