//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Bearer token verification
//! - `checkout` - Cart to pending order to payment intent
//! - `webhook` - Payment events to order status
//!
//! Services borrow their collaborators from [`crate::state::AppState`] for
//! the length of one request and hold no state of their own.

pub mod auth;
pub mod checkout;
pub mod webhook;

pub use auth::{AuthError, Claims, TokenVerifier};
pub use checkout::{
    CheckoutError, CheckoutIdentity, CheckoutItemInput, CheckoutRequest, CheckoutService,
    CheckoutSession, ShippingAddressInput,
};
pub use webhook::{WebhookError, WebhookOutcome, WebhookReconciler};
