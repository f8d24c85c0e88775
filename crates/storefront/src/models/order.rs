//! Order domain types.

use chrono::{DateTime, Utc};
use printshop_core::{CheckoutItem, CurrencyCode, Email, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::FieldError;

/// One purchased line, with the unit price captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(rename = "productRef")]
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price in major currency units.
    #[serde(rename = "price")]
    pub unit_price: i64,
}

impl From<CheckoutItem> for OrderItem {
    fn from(item: CheckoutItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.price,
        }
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub zip_code: String,
    pub city: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Contact email; always present on guest orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest orders.
    pub user: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    /// Items plus shipping, in major currency units.
    pub total_amount: i64,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build the pending order a validated draft becomes on insert.
    #[must_use]
    pub fn pending(id: OrderId, draft: OrderDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user: draft.user,
            items: draft.items,
            shipping_address: draft.shipping_address,
            total_amount: draft.total_amount,
            currency: draft.currency,
            status: OrderStatus::Pending,
            payment_intent_id: None,
            created_at,
        }
    }

    /// Whether this order was placed without an account.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.user.is_none()
    }

    /// Whether `user` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user == Some(user)
    }

    /// Whether this is a guest order whose contact email matches `email`.
    ///
    /// Both sides are normalized [`Email`]s, so the comparison is
    /// case-insensitive.
    #[must_use]
    pub fn is_guest_contact(&self, email: &Email) -> bool {
        self.is_guest() && self.shipping_address.email.as_ref() == Some(email)
    }
}

/// Everything needed to insert a new pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub total_amount: i64,
    pub currency: CurrencyCode,
}

impl OrderDraft {
    /// Check the invariants every stored order must satisfy.
    ///
    /// # Errors
    ///
    /// Returns every violated rule as a [`FieldError`].
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.items.is_empty() {
            errors.push(FieldError::new("items", "order must contain at least one item"));
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                errors.push(FieldError::new(
                    format!("items[{index}].quantity"),
                    "quantity must be at least 1",
                ));
            }
            if item.unit_price < 0 {
                errors.push(FieldError::new(
                    format!("items[{index}].price"),
                    "price must not be negative",
                ));
            }
        }
        if self.total_amount <= 0 {
            errors.push(FieldError::new(
                "totalAmount",
                "total amount must be positive",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_valid_draft() {
        assert!(draft(None).validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_error() {
        let mut bad = draft(None);
        bad.items[0].quantity = 0;
        bad.items[1].unit_price = -5;
        bad.total_amount = 0;

        let errors = bad.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["items[0].quantity", "items[1].price", "totalAmount"]
        );
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut bad = draft(None);
        bad.items.clear();
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors[0].field, "items");
    }

    #[test]
    fn test_pending_order_from_draft() {
        let user = UserId::new(7);
        let order = Order::pending(OrderId::generate(), draft(Some(user)), Utc::now());

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payment_intent_id.is_none());
        assert!(order.is_owned_by(user));
        assert!(!order.is_owned_by(UserId::new(8)));
        assert!(!order.is_guest());
    }

    #[test]
    fn test_guest_contact_match_is_case_insensitive() {
        let order = Order::pending(OrderId::generate(), draft(None), Utc::now());
        let email = Email::parse("Astrid@Example.SE").unwrap();
        assert!(order.is_guest_contact(&email));

        let other = Email::parse("someone@example.se").unwrap();
        assert!(!order.is_guest_contact(&other));
    }

    #[test]
    fn test_order_json_shape() {
        let order = Order::pending(OrderId::generate(), draft(None), Utc::now());
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["totalAmount"], 349);
        assert_eq!(json["currency"], "SEK");
        assert!(json["paymentIntentId"].is_null());
        assert_eq!(json["items"][0]["productRef"], 1);
        assert_eq!(json["items"][0]["price"], 100);
        assert_eq!(json["shippingAddress"]["zipCode"], "411 38");
    }
}
