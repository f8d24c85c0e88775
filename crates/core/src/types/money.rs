//! Integer money amounts and currency minor-unit conversion.
//!
//! Prices and order totals are whole amounts in the currency's **major** unit
//! (kronor, dollars). Payment gateways want an integer count of **minor**
//! units (öre, cents), so the conversion happens exactly once, through
//! [`Money::to_minor_units`], right before a payment intent is requested.

use serde::{Deserialize, Serialize};

/// Errors from currency parsing and minor-unit conversion.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// The currency code is not one the shop can charge in.
    #[error("unsupported currency code: {0}")]
    Unsupported(String),
    /// Converting to minor units overflowed `i64`.
    #[error("amount {0} is too large to convert to minor units")]
    Overflow(i64),
}

/// ISO 4217 currency codes the shop can charge in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    SEK,
    NOK,
    DKK,
    EUR,
    USD,
    GBP,
    JPY,
}

impl CurrencyCode {
    /// Uppercase ISO code (`"SEK"`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SEK => "SEK",
            Self::NOK => "NOK",
            Self::DKK => "DKK",
            Self::EUR => "EUR",
            Self::USD => "USD",
            Self::GBP => "GBP",
            Self::JPY => "JPY",
        }
    }

    /// Lowercase ISO code, as payment gateways expect it (`"sek"`).
    #[must_use]
    pub const fn gateway_code(self) -> &'static str {
        match self {
            Self::SEK => "sek",
            Self::NOK => "nok",
            Self::DKK => "dkk",
            Self::EUR => "eur",
            Self::USD => "usd",
            Self::GBP => "gbp",
            Self::JPY => "jpy",
        }
    }

    /// Number of minor units in one major unit.
    ///
    /// Zero-decimal currencies (JPY) have a factor of 1.
    #[must_use]
    pub const fn minor_unit_factor(self) -> i64 {
        match self {
            Self::JPY => 1,
            Self::SEK | Self::NOK | Self::DKK | Self::EUR | Self::USD | Self::GBP => 100,
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SEK" => Ok(Self::SEK),
            "NOK" => Ok(Self::NOK),
            "DKK" => Ok(Self::DKK),
            "EUR" => Ok(Self::EUR),
            "USD" => Ok(Self::USD),
            "GBP" => Ok(Self::GBP),
            "JPY" => Ok(Self::JPY),
            other => Err(CurrencyError::Unsupported(other.to_owned())),
        }
    }
}

/// A whole amount in a currency's major unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in major units (e.g. kronor, not öre).
    pub amount: i64,
    /// Currency of the amount.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: i64, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Convert to the gateway's integer minor-unit representation.
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError::Overflow`] if the result does not fit in `i64`.
    pub const fn to_minor_units(self) -> Result<i64, CurrencyError> {
        match self.amount.checked_mul(self.currency.minor_unit_factor()) {
            Some(minor) => Ok(minor),
            None => Err(CurrencyError::Overflow(self.amount)),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
