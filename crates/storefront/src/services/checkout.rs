//! Checkout orchestration.
//!
//! Turns a submitted cart into a pending order plus a payment intent:
//!
//! 1. Validate the request, collecting every field problem at once.
//! 2. Compute `Σ price × quantity + shipping fee` (fee from configuration).
//! 3. Persist the order as `pending`.
//! 4. Ask the gateway for an intent for the total in minor units, tagged with
//!    the order id.
//! 5. Attach the intent id to the order.
//!
//! A gateway failure after step 3 leaves a `pending` order without an intent.
//! Nothing is rolled back or retried; the client simply checks out again.

use printshop_core::{
    CheckoutItem, CurrencyError, Email, Money, OrderId, ProductId, UserId, order_total,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::CheckoutConfig;
use crate::db::RepositoryError;
use crate::models::{FieldError, OrderDraft, OrderItem, ShippingAddress};
use crate::payments::{CreateIntent, PaymentError, PaymentGateway};
use crate::store::OrderStore;

/// Who is checking out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutIdentity {
    /// An authenticated customer; the order is bound to them.
    Customer(UserId),
    /// No account; a contact email is required.
    Guest,
}

impl CheckoutIdentity {
    const fn user(self) -> Option<UserId> {
        match self {
            Self::Customer(user) => Some(user),
            Self::Guest => None,
        }
    }

    const fn is_guest(self) -> bool {
        matches!(self, Self::Guest)
    }
}

/// A cart line as submitted by the client.
///
/// Every field is optional so that a bad line produces a field error rather
/// than rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemInput {
    #[serde(alias = "_id")]
    pub product_ref: Option<ProductId>,
    pub quantity: Option<i64>,
    pub price: Option<i64>,
}

/// A shipping address as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub street: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Body of both payment-intent endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutItemInput>,
    pub shipping_address: Option<ShippingAddressInput>,
}

/// What the client needs to confirm the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub client_secret: String,
    pub order_id: OrderId,
}

/// Errors from [`CheckoutService::checkout`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid checkout request")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl From<CurrencyError> for CheckoutError {
    fn from(err: CurrencyError) -> Self {
        Self::Validation(vec![FieldError::new("items", err.to_string())])
    }
}

/// Checkout orchestrator.
pub struct CheckoutService<'a> {
    orders: &'a dyn OrderStore,
    gateway: &'a dyn PaymentGateway,
    pricing: CheckoutConfig,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        orders: &'a dyn OrderStore,
        gateway: &'a dyn PaymentGateway,
        pricing: CheckoutConfig,
    ) -> Self {
        Self {
            orders,
            gateway,
            pricing,
        }
    }

    /// Create a pending order and a payment intent for it.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Validation`] for bad input (nothing is persisted),
    /// [`CheckoutError::Payment`] if the gateway fails (the order stays
    /// `pending` without an intent), [`CheckoutError::Repository`] if the
    /// store fails.
    #[instrument(skip(self, request), fields(guest = identity.is_guest(), order_id))]
    pub async fn checkout(
        &self,
        identity: CheckoutIdentity,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        let (items, shipping_address) =
            validate_request(identity, request).map_err(CheckoutError::Validation)?;

        let total = order_total(&items, self.pricing.shipping_fee).map_err(|e| {
            CheckoutError::Validation(vec![FieldError::new("items", e.to_string())])
        })?;
        let amount_minor = Money::new(total, self.pricing.currency).to_minor_units()?;

        let order = self
            .orders
            .create(OrderDraft {
                user: identity.user(),
                items: items.into_iter().map(OrderItem::from).collect(),
                shipping_address,
                total_amount: total,
                currency: self.pricing.currency,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Validation(fields) => CheckoutError::Validation(fields),
                other => CheckoutError::Repository(other),
            })?;
        tracing::Span::current().record("order_id", tracing::field::display(order.id));
        info!(total, currency = %order.currency, "pending order created");

        let intent = self
            .gateway
            .create_intent(CreateIntent::for_order(
                order.id,
                amount_minor,
                self.pricing.currency,
            ))
            .await
            .inspect_err(|e| {
                warn!(error = %e, "payment intent creation failed, order left pending");
            })?;

        self.orders
            .attach_payment_intent(order.id, &intent.id)
            .await?;
        info!(payment_intent_id = %intent.id, "payment intent attached");

        Ok(CheckoutSession {
            client_secret: intent.client_secret,
            order_id: order.id,
        })
    }
}

/// Validate a request into checkout lines and a shipping address.
fn validate_request(
    identity: CheckoutIdentity,
    request: CheckoutRequest,
) -> Result<(Vec<CheckoutItem>, ShippingAddress), Vec<FieldError>> {
    let mut errors = Vec::new();

    if request.items.is_empty() {
        errors.push(FieldError::new("items", "cart is empty"));
    }
    let items: Vec<CheckoutItem> = request
        .items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| validate_item(index, item, &mut errors))
        .collect();

    let address = match request.shipping_address {
        Some(input) => validate_address(input, identity.is_guest(), &mut errors),
        None => {
            errors.push(FieldError::new(
                "shippingAddress",
                "shipping address is required",
            ));
            None
        }
    };

    match address {
        Some(address) if errors.is_empty() => Ok((items, address)),
        _ => Err(errors),
    }
}

fn validate_item(
    index: usize,
    item: &CheckoutItemInput,
    errors: &mut Vec<FieldError>,
) -> Option<CheckoutItem> {
    let before = errors.len();
    let field = |name: &str| format!("items[{index}].{name}");

    if item.product_ref.is_none() {
        errors.push(FieldError::new(field("productRef"), "product is required"));
    }

    let quantity = match item.quantity {
        None => {
            errors.push(FieldError::new(field("quantity"), "quantity is required"));
            None
        }
        Some(q) if q < 1 => {
            errors.push(FieldError::new(
                field("quantity"),
                "quantity must be at least 1",
            ));
            None
        }
        Some(q) => u32::try_from(q).map_or_else(
            |_| {
                errors.push(FieldError::new(field("quantity"), "quantity is too large"));
                None
            },
            Some,
        ),
    };

    match item.price {
        None => errors.push(FieldError::new(field("price"), "price is required")),
        Some(p) if p < 0 => {
            errors.push(FieldError::new(field("price"), "price must not be negative"));
        }
        Some(_) => {}
    }

    if errors.len() != before {
        return None;
    }
    Some(CheckoutItem {
        product_id: item.product_ref?,
        quantity: quantity?,
        price: item.price?,
    })
}

fn validate_address(
    input: ShippingAddressInput,
    require_email: bool,
    errors: &mut Vec<FieldError>,
) -> Option<ShippingAddress> {
    let before = errors.len();
    let mut required = |value: Option<String>, name: &str, label: &str| -> String {
        let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
        if value.is_empty() {
            errors.push(FieldError::new(
                format!("shippingAddress.{name}"),
                format!("{label} is required"),
            ));
        }
        value
    };

    let first_name = required(input.first_name, "firstName", "first name");
    let last_name = required(input.last_name, "lastName", "last name");
    let street = required(input.street, "street", "street");
    let zip_code = required(input.zip_code, "zipCode", "zip code");
    let city = required(input.city, "city", "city");
    let country = required(input.country, "country", "country");

    let email = match input.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => match Email::parse(raw) {
            Ok(email) => Some(email),
            Err(e) => {
                errors.push(FieldError::new("shippingAddress.email", e.to_string()));
                None
            }
        },
        None => {
            if require_email {
                errors.push(FieldError::new(
                    "shippingAddress.email",
                    "email is required for guest checkout",
                ));
            }
            None
        }
    };

    let phone = input
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    (errors.len() == before).then_some(ShippingAddress {
        first_name,
        last_name,
        street,
        zip_code,
        city,
        country,
        phone,
        email,
    })
}
