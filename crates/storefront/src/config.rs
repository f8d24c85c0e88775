//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STRIPE_SECRET_KEY` - Stripe secret or restricted key (`sk_...` / `rk_...`)
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret (`whsec_...`)
//! - `STOREFRONT_JWT_SECRET` - HS256 key for bearer tokens (min 32 chars, high entropy)
//! - `STOREFRONT_SHIPPING_FEE` - Flat shipping fee in major currency units
//! - `STOREFRONT_CURRENCY` - ISO 4217 code orders are charged in (e.g. `SEK`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 8080)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_WEBHOOK_TOLERANCE_SECS` - Max webhook timestamp skew (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use printshop_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// HS256 key used to verify customer bearer tokens
    pub jwt_secret: SecretString,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Checkout pricing configuration
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret
    pub webhook_secret: SecretString,
    /// API base URL, overridable for stripe-mock
    pub api_base: Url,
    /// Maximum accepted age of a webhook signature timestamp
    pub webhook_tolerance: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("webhook_tolerance", &self.webhook_tolerance)
            .finish()
    }
}

/// Checkout pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Flat shipping fee added to every order, in major units
    pub shipping_fee: i64,
    /// Currency every order is charged in
    pub currency: CurrencyCode,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (prefix, placeholder and entropy checks).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let database_url = env.database_url("STOREFRONT_DATABASE_URL")?;
        let host = env.parse_or("STOREFRONT_HOST", "127.0.0.1".parse::<IpAddr>())?;
        let port = env.parse_or("STOREFRONT_PORT", Ok::<u16, std::num::ParseIntError>(8080))?;

        let jwt_secret = env.validated_secret("STOREFRONT_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "STOREFRONT_JWT_SECRET")?;

        let stripe = StripeConfig::from_env(&env)?;
        let checkout = CheckoutConfig::from_env(&env)?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            stripe,
            checkout,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let secret_key = env.validated_secret("STRIPE_SECRET_KEY")?;
        require_prefix(&secret_key, "STRIPE_SECRET_KEY", &["sk_", "rk_"])?;

        let webhook_secret = env.validated_secret("STRIPE_WEBHOOK_SECRET")?;
        require_prefix(&webhook_secret, "STRIPE_WEBHOOK_SECRET", &["whsec_"])?;

        let api_base = env.parse_or("STRIPE_API_BASE", Url::parse(DEFAULT_STRIPE_API_BASE))?;
        let tolerance_secs = env.parse_or(
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            Ok::<u64, std::num::ParseIntError>(DEFAULT_WEBHOOK_TOLERANCE_SECS),
        )?;

        Ok(Self {
            secret_key,
            webhook_secret,
            api_base,
            webhook_tolerance: Duration::from_secs(tolerance_secs),
        })
    }
}

impl CheckoutConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let shipping_fee = env
            .required("STOREFRONT_SHIPPING_FEE")?
            .trim()
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_SHIPPING_FEE".to_string(), e.to_string())
            })?;
        if shipping_fee < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_SHIPPING_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let currency = env
            .required("STOREFRONT_CURRENCY")?
            .parse::<CurrencyCode>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_CURRENCY".to_string(), e.to_string())
            })?;

        Ok(Self {
            shipping_fee,
            currency,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Environment lookup with the typed accessors used above.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        (self.0)(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse an optional variable, or fall back to `default`.
    fn parse_or<T, E>(&self, key: &str, default: Result<T, E>) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
        E: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => default.map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        }
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Validate that a Stripe credential carries one of its documented prefixes.
fn require_prefix(
    secret: &SecretString,
    var_name: &str,
    prefixes: &[&str],
) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if prefixes.iter().any(|p| value.starts_with(p)) {
        return Ok(());
    }
    Err(ConfigError::InvalidEnvVar(
        var_name.to_string(),
        format!("must start with one of {}", prefixes.join(", ")),
    ))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRIPE_KEY: &str = "sk_test_51HqLyjWDarjtT1zdp7dcXfR3kQ9mZ";
    const WEBHOOK_SECRET: &str = "whsec_Jf83kLq02XmZp7Rt5YvB1nCw9GdH";
    const JWT_SECRET: &str = "q8F!t2Lz#9vR@c4Wm$7nK0pY^s3Xb6Hj";

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/printshop"),
            ("STRIPE_SECRET_KEY", STRIPE_KEY),
            ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("STOREFRONT_JWT_SECRET", JWT_SECRET),
            ("STOREFRONT_SHIPPING_FEE", "49"),
            ("STOREFRONT_CURRENCY", "sek"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<StorefrontConfig, ConfigError> {
        StorefrontConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
    }

    #[test]
    fn test_load_with_defaults() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.checkout.shipping_fee, 49);
        assert_eq!(config.checkout.currency, CurrencyCode::SEK);
        assert_eq!(config.stripe.api_base.as_str(), "https://api.stripe.com/");
        assert_eq!(config.stripe.webhook_tolerance, Duration::from_secs(300));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_database_url_fallback() {
        let mut vars = base_vars();
        vars.remove("STOREFRONT_DATABASE_URL");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::MissingEnvVar(key)) if key == "STOREFRONT_DATABASE_URL"
        ));

        vars.insert("DATABASE_URL", "postgres://fly/attached");
        let config = load(&vars).unwrap();
        assert_eq!(
            config.database_url.expose_secret(),
            "postgres://fly/attached"
        );
    }

    #[test]
    fn test_stripe_key_prefix_required() {
        let mut vars = base_vars();
        vars.insert("STRIPE_SECRET_KEY", "pk_test_51HqLyjWDarjtT1zdp7dcXfR3kQ9mZ");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "STRIPE_SECRET_KEY"
        ));
    }

    #[test]
    fn test_webhook_secret_prefix_required() {
        let mut vars = base_vars();
        vars.insert("STRIPE_WEBHOOK_SECRET", "Jf83kLq02XmZp7Rt5YvB1nCw9GdH");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "STRIPE_WEBHOOK_SECRET"
        ));
    }

    #[test]
    fn test_negative_shipping_fee_rejected() {
        let mut vars = base_vars();
        vars.insert("STOREFRONT_SHIPPING_FEE", "-1");
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_unsupported_currency_rejected() {
        let mut vars = base_vars();
        vars.insert("STOREFRONT_CURRENCY", "XBT");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "STOREFRONT_CURRENCY"
        ));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut vars = base_vars();
        vars.insert("STOREFRONT_JWT_SECRET", "q8F!t2Lz#9vR@c4W");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let config = load(&base_vars()).unwrap();
        let debug_output = format!("{:?}", config.stripe);

        assert!(debug_output.contains("api.stripe.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(STRIPE_KEY));
        assert!(!debug_output.contains(WEBHOOK_SECRET));
    }
}
