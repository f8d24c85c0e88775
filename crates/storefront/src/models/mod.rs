//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from database row types and
//! from the raw request bodies the routes accept.

pub mod order;
pub mod product;

use serde::Serialize;

pub use order::{Order, OrderDraft, OrderItem, ShippingAddress};
pub use product::{Product, ProductSummary};

/// A single field-level validation failure.
///
/// `field` is the camelCase JSON path of the offending value, e.g.
/// `items[1].quantity` or `shippingAddress.email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
