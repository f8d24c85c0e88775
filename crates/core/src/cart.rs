//! Observable in-memory shopping cart.
//!
//! The cart lives on the client. It aggregates products into lines, notifies
//! subscribers after every effective change, and hands the storefront a
//! snapshot of [`CheckoutItem`]s at checkout time.
//!
//! Invariant: no line ever has quantity 0. Every mutation path (explicit
//! removal, `set_quantity(_, 0)`, decrementing the last unit, restoring a
//! persisted snapshot) removes the line instead.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use printshop_core::{Cart, CartEvent, CartProduct, ProductId};
//!
//! let print = CartProduct {
//!     id: ProductId::new(1),
//!     name: "Harbour at dusk".to_owned(),
//!     price: 253,
//!     image: None,
//! };
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let mut cart = Cart::new();
//! let sink = Arc::clone(&seen);
//! cart.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
//!
//! cart.add(print.clone());
//! cart.add(print);
//! cart.set_quantity(ProductId::new(1), 0);
//!
//! assert!(cart.is_empty());
//! assert_eq!(seen.lock().unwrap().len(), 3);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checkout::CheckoutItem;
use crate::types::ProductId;

/// The product data a cart line keeps for display and checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    /// Catalog product id.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in major currency units at the time it was added.
    pub price: i64,
    /// Main image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product snapshot.
    pub product: CartProduct,
    /// Units of this product, always at least 1 inside a [`Cart`].
    pub quantity: u32,
}

impl CartLine {
    /// `price × quantity`, saturating.
    #[must_use]
    pub fn line_total(&self) -> i64 {
        self.product.price.saturating_mul(i64::from(self.quantity))
    }
}

/// A change notification delivered to cart subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// A product was added as a new line with quantity 1.
    LineAdded {
        /// The product added.
        product_id: ProductId,
    },
    /// An existing line's quantity changed to `quantity` (never 0).
    QuantityChanged {
        /// The product whose line changed.
        product_id: ProductId,
        /// New quantity.
        quantity: u32,
    },
    /// A line was removed.
    LineRemoved {
        /// The product whose line was removed.
        product_id: ProductId,
    },
    /// All lines were removed.
    Cleared,
}

/// Handle returned by [`Cart::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&CartEvent) + Send + Sync>;

/// Shopping cart service with a mutation API and change notification.
#[derive(Default)]
pub struct Cart {
    lines: Vec<CartLine>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for Cart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cart")
            .field("lines", &self.lines)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cart from a persisted snapshot.
    ///
    /// Zero-quantity lines are dropped and duplicate products are merged
    /// (keeping the first snapshot and summing quantities), so a snapshot
    /// written by an older client can never break the cart invariant.
    #[must_use]
    pub fn restore(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match cart.position(line.product.id) {
                Some(index) => {
                    if let Some(existing) = cart.lines.get_mut(index) {
                        existing.quantity = existing.quantity.saturating_add(line.quantity);
                    }
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }

    /// Lines in insertion order, for display.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Serializable copy of the lines, for local persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity of a product, 0 if it is not in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.position(product_id)
            .and_then(|index| self.lines.get(index))
            .map_or(0, |line| line.quantity)
    }

    /// Total units across all lines (the header badge count).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of line totals, excluding shipping.
    #[must_use]
    pub fn subtotal(&self) -> i64 {
        self.lines
            .iter()
            .fold(0_i64, |acc, line| acc.saturating_add(line.line_total()))
    }

    /// The line items to submit at checkout.
    #[must_use]
    pub fn checkout_items(&self) -> Vec<CheckoutItem> {
        self.lines
            .iter()
            .map(|line| CheckoutItem {
                product_id: line.product.id,
                quantity: line.quantity,
                price: line.product.price,
            })
            .collect()
    }

    /// Add one unit of `product`, appending a new line if needed.
    pub fn add(&mut self, product: CartProduct) {
        let product_id = product.id;
        let event = match self.position(product_id).and_then(|i| self.lines.get_mut(i)) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(1);
                CartEvent::QuantityChanged {
                    product_id,
                    quantity: line.quantity,
                }
            }
            None => {
                self.lines.push(CartLine {
                    product,
                    quantity: 1,
                });
                CartEvent::LineAdded { product_id }
            }
        };
        self.notify(&event);
    }

    /// Remove the line for `product_id`. Removing an absent product is a no-op.
    pub fn remove(&mut self, product_id: ProductId) {
        let before = self.lines.len();
        self.lines.retain(|line| line.product.id != product_id);
        if self.lines.len() != before {
            self.notify(&CartEvent::LineRemoved { product_id });
        }
    }

    /// Set the quantity of an existing line.
    ///
    /// `quantity == 0` is exactly [`Cart::remove`]. Setting a quantity for a
    /// product that is not in the cart does nothing; use [`Cart::add`].
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }

        let Some(line) = self.position(product_id).and_then(|i| self.lines.get_mut(i)) else {
            return;
        };
        if line.quantity == quantity {
            return;
        }
        line.quantity = quantity;
        self.notify(&CartEvent::QuantityChanged {
            product_id,
            quantity,
        });
    }

    /// Remove one unit; the line disappears when it reaches zero.
    pub fn decrement(&mut self, product_id: ProductId) {
        let current = self.quantity_of(product_id);
        if current > 0 {
            self.set_quantity(product_id, current - 1);
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        self.lines.clear();
        self.notify(&CartEvent::Cleared);
    }

    /// Register a listener called after every effective change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Drop a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product.id == product_id)
    }

    fn notify(&self, event: &CartEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}
