//! Stripe REST client.
//!
//! Talks to `POST /v1/payment_intents` with form-encoded bodies and verifies
//! webhooks with the endpoint signing secret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    CreateIntent, PaymentError, PaymentGateway, PaymentIntent, WebhookEvent, WebhookVerifier,
    ensure_positive_amount, verify_event,
};
use crate::config::StripeConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Form field carrying the order id into the intent's metadata.
const ORDER_ID_FORM_FIELD: &str = "metadata[orderId]";

/// Error envelope returned by the Stripe API.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    payment_intents_url: Url,
    verifier: WebhookVerifier,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the configured
    /// API base cannot be joined with the endpoint path.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Unavailable(format!("invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        let payment_intents_url = config
            .api_base
            .join("v1/payment_intents")
            .map_err(|e| PaymentError::Unavailable(format!("invalid API base: {e}")))?;

        Ok(Self {
            client,
            payment_intents_url,
            verifier: WebhookVerifier::new(
                config.webhook_secret.clone(),
                config.webhook_tolerance,
            ),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = request.amount_minor))]
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, PaymentError> {
        ensure_positive_amount(request.amount_minor)?;

        let form = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.gateway_code().to_string()),
            (ORDER_ID_FORM_FIELD, request.order_id.to_string()),
        ];

        let response = self
            .client
            .post(self.payment_intents_url.clone())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let intent: PaymentIntent = response
                .json()
                .await
                .map_err(|e| PaymentError::Unavailable(format!("unreadable response: {e}")))?;
            debug!(payment_intent_id = %intent.id, "payment intent created");
            return Ok(intent);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&body).map_or_else(
            |_| format!("HTTP {status}"),
            |parsed| {
                let kind = parsed.error.kind.unwrap_or_default();
                let text = parsed.error.message.unwrap_or_default();
                format!("{kind}: {text}")
            },
        );

        if status.is_client_error() {
            warn!(%status, %message, "Stripe rejected payment intent");
            Err(PaymentError::Rejected(message))
        } else {
            warn!(%status, %message, "Stripe failed to create payment intent");
            Err(PaymentError::Unavailable(message))
        }
    }

    fn verify_and_parse_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_event(&self.verifier, raw_body, signature_header)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use printshop_core::{CurrencyCode, OrderId};
    use secrecy::SecretString;

    use super::*;

    fn config() -> StripeConfig {
        StripeConfig {
            secret_key: SecretString::from("sk_test_51HqLyjWDarjtT1zdp7dcXfR3kQ9mZ"),
            webhook_secret: SecretString::from("whsec_Jf83kLq02XmZp7Rt5YvB1nCw9GdH"),
            api_base: Url::parse("http://127.0.0.1:9").unwrap(),
            webhook_tolerance: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_endpoint_url() {
        let client = StripeClient::new(&config()).unwrap();
        assert_eq!(
            client.payment_intents_url.as_str(),
            "http://127.0.0.1:9/v1/payment_intents"
        );
    }

    #[tokio::test]
    async fn test_non_positive_amount_fails_before_network() {
        let client = StripeClient::new(&config()).unwrap();
        for amount in [0, -100] {
            let err = client
                .create_intent(CreateIntent::for_order(
                    OrderId::generate(),
                    amount,
                    CurrencyCode::SEK,
                ))
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::InvalidAmount(a) if a == amount));
        }
    }

    #[test]
    fn test_webhook_roundtrip_with_configured_secret() {
        let config = config();
        let client = StripeClient::new(&config).unwrap();
        let body = br#"{"id":"evt_1","type":"charge.succeeded","data":{"object":{}}}"#;
        let header = WebhookVerifier::new(config.webhook_secret, config.webhook_tolerance)
            .signature_header(body, chrono::Utc::now().timestamp());

        let event = client.verify_and_parse_event(body, &header).unwrap();
        assert_eq!(event.event_type, "charge.succeeded");

        assert!(matches!(
            client.verify_and_parse_event(body, "t=1,v1=00"),
            Err(PaymentError::InvalidSignature(_))
        ));
    }
}
