//! Persistence seams for orders and the product catalog.
//!
//! Handlers and services only see the [`OrderStore`] and [`ProductCatalog`]
//! traits. Production wires in the `PostgreSQL` implementations from
//! [`crate::db`]; tests and local development use [`memory`].
//!
//! # Order lifecycle writes
//!
//! Two uncorrelated writers touch an order:
//!
//! 1. Checkout creates it `pending` and then attaches the payment intent id.
//! 2. The payment webhook moves it to `paid`.
//!
//! [`OrderStore::set_status`] is idempotent so that duplicated or late webhook
//! deliveries are harmless: re-applying a status the order already reached
//! returns [`StatusChange::Unchanged`] instead of an error.

pub mod memory;

use async_trait::async_trait;
use printshop_core::{OrderId, OrderStatus, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{Order, OrderDraft, Product};

pub use memory::{MemoryOrderStore, MemoryProductCatalog};

/// Result of [`OrderStore::set_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// The order moved one step forward.
    Updated(Order),
    /// The order was already at or past the target status; nothing was written.
    Unchanged(Order),
}

impl StatusChange {
    /// The order after the call.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Updated(order) | Self::Unchanged(order) => order,
        }
    }

    /// Whether a write happened.
    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// What `set_status` should do for an order currently at `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Apply,
    AlreadyReached,
}

/// Decide a status change.
///
/// # Errors
///
/// Returns [`RepositoryError::InvalidTransition`] if `target` skips a step.
pub(crate) fn plan_transition(
    current: OrderStatus,
    target: OrderStatus,
) -> Result<Transition, RepositoryError> {
    if current.has_reached(target) {
        Ok(Transition::AlreadyReached)
    } else if current.can_advance_to(target) {
        Ok(Transition::Apply)
    } else {
        Err(RepositoryError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

/// Durable order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new `pending` order.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Validation`] if the draft breaks an order invariant.
    async fn create(&self, draft: OrderDraft) -> Result<Order, RepositoryError>;

    /// Record the payment intent for an order.
    ///
    /// Attaching the same intent twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Conflict`] if a different intent is already attached
    /// or the intent belongs to another order; [`RepositoryError::NotFound`]
    /// if the order does not exist.
    async fn attach_payment_intent(
        &self,
        order_id: OrderId,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError>;

    /// Advance an order's status one step.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidTransition`] when skipping steps;
    /// [`RepositoryError::NotFound`] if the order does not exist.
    async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, RepositoryError>;

    /// Load one order.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] on a miss.
    async fn find_by_id(&self, order_id: OrderId) -> Result<Order, RepositoryError>;

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    async fn find_by_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// The order a payment intent was attached to.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] on a miss.
    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError>;

    /// Check the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if it is not.
    async fn health_check(&self) -> Result<(), RepositoryError>;
}

/// Read-only access to the print catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Load one product.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] on a miss.
    async fn get(&self, id: ProductId) -> Result<Product, RepositoryError>;

    /// Every product, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// The subset of `ids` that exist, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_transition() {
        assert_eq!(
            plan_transition(OrderStatus::Pending, OrderStatus::Paid).ok(),
            Some(Transition::Apply)
        );
        assert_eq!(
            plan_transition(OrderStatus::Paid, OrderStatus::Paid).ok(),
            Some(Transition::AlreadyReached)
        );
        assert_eq!(
            plan_transition(OrderStatus::Shipped, OrderStatus::Paid).ok(),
            Some(Transition::AlreadyReached)
        );
        assert!(matches!(
            plan_transition(OrderStatus::Pending, OrderStatus::Shipped),
            Err(RepositoryError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            })
        ));
    }
}
