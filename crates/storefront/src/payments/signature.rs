//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` is `HMAC-SHA256(secret, "{t}.{raw body}")`; during secret
//! rotation Stripe sends one per active secret, and any match is accepted.
//! The MAC is always computed over the raw request bytes.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is empty or malformed")]
    MalformedHeader,
    #[error("signature header has no timestamp")]
    MissingTimestamp,
    #[error("signature header has no v1 signature")]
    MissingSignature,
    #[error("signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// Verifies (and, for tests, produces) `Stripe-Signature` headers.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    /// Create a verifier for one endpoint secret.
    #[must_use]
    pub const fn new(secret: SecretString, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Verify `header` against `payload` at the current time.
    ///
    /// # Errors
    ///
    /// Returns the first [`SignatureError`] found.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, unix_now())
    }

    /// Verify `header` against `payload` as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first [`SignatureError`] found.
    #[instrument(skip_all)]
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let parsed = ParsedHeader::parse(header)?;

        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if now.saturating_sub(parsed.timestamp).abs() > tolerance {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let expected = self.compute(parsed.timestamp, payload);
        if !parsed
            .signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate))
        {
            return Err(SignatureError::Mismatch);
        }

        debug!("Stripe signature verified");
        Ok(())
    }

    /// Build a valid header for `payload` signed at `timestamp`.
    #[must_use]
    pub fn signature_header(&self, payload: &[u8], timestamp: i64) -> String {
        format!("t={timestamp},v1={}", self.compute(timestamp, payload))
    }

    fn compute(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> ParsedHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, SignatureError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(SignatureError::MalformedHeader);
        }

        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(SignatureError::MalformedHeader)?;
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| SignatureError::MalformedHeader)?,
                    );
                }
                "v1" if !value.is_empty() => signatures.push(value),
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::MissingSignature);
        }
        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
