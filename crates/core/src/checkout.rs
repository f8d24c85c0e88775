//! Checkout line items and order total arithmetic.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// One validated line of a checkout request.
///
/// Serializes to the wire shape the storefront accepts:
/// `{"productRef": 7, "quantity": 2, "price": 100}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    /// Product being bought.
    #[serde(rename = "productRef")]
    pub product_id: ProductId,
    /// Number of units, at least 1.
    pub quantity: u32,
    /// Unit price in major currency units, captured from the cart snapshot.
    pub price: i64,
}

impl CheckoutItem {
    /// `price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<i64> {
        self.price.checked_mul(i64::from(self.quantity))
    }
}

/// Errors computing an order total.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalError {
    /// The sum does not fit in `i64`.
    #[error("order total overflows")]
    Overflow,
}

/// Compute `Σ(price × quantity) + shipping_fee`.
///
/// The result does not depend on item order. Validation of quantities and
/// prices is the caller's job; this only guards the arithmetic.
///
/// # Errors
///
/// Returns [`TotalError::Overflow`] if any product or the sum overflows.
///
/// # Example
///
/// ```
/// use printshop_core::{CheckoutItem, ProductId, order_total};
///
/// let items = [
///     CheckoutItem { product_id: ProductId::new(1), quantity: 2, price: 100 },
///     CheckoutItem { product_id: ProductId::new(2), quantity: 1, price: 50 },
/// ];
/// assert_eq!(order_total(&items, 49), Ok(349));
/// ```
pub fn order_total(items: &[CheckoutItem], shipping_fee: i64) -> Result<i64, TotalError> {
    items.iter().try_fold(shipping_fee, |acc, item| {
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or(TotalError::Overflow)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i32, quantity: u32, price: i64) -> CheckoutItem {
        CheckoutItem {
            product_id: ProductId::new(id),
            quantity,
            price,
        }
    }

    #[test]
    fn test_total_includes_shipping() {
        let items = [item(1, 2, 100), item(2, 1, 50)];
        assert_eq!(order_total(&items, 49).unwrap(), 349);
    }

    #[test]
    fn test_total_is_order_independent() {
        let mut items = vec![item(1, 3, 253), item(2, 1, 99), item(3, 5, 10)];
        let forward = order_total(&items, 49).unwrap();
        items.reverse();
        assert_eq!(order_total(&items, 49).unwrap(), forward);
        items.swap(0, 1);
        assert_eq!(order_total(&items, 49).unwrap(), forward);
    }

    #[test]
    fn test_total_of_no_items_is_shipping_fee() {
        assert_eq!(order_total(&[], 49).unwrap(), 49);
    }

    #[test]
    fn test_total_overflow() {
        let items = [item(1, 2, i64::MAX)];
        assert_eq!(order_total(&items, 0), Err(TotalError::Overflow));

        let items = [item(1, 1, i64::MAX)];
        assert_eq!(order_total(&items, 1), Err(TotalError::Overflow));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(item(7, 2, 100)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"productRef": 7, "quantity": 2, "price": 100})
        );
    }
}
