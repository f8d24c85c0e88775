//! In-memory [`OrderStore`] and [`ProductCatalog`].
//!
//! Used by the test suites and for running the API without a database.
//! Each operation holds the lock for its whole read-check-write, which gives
//! the same atomicity the `PostgreSQL` store gets from its conditional updates.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use printshop_core::{OrderId, OrderStatus, ProductId, UserId};
use tokio::sync::RwLock;

use super::{OrderStore, ProductCatalog, StatusChange, Transition, plan_transition};
use crate::db::RepositoryError;
use crate::models::{Order, OrderDraft, Product};

/// Orders kept in insertion order behind a `tokio` lock.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    unavailable: AtomicBool,
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Whether the store holds no orders.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        self.check_available()?;
        draft.validate().map_err(RepositoryError::Validation)?;

        let order = Order::pending(OrderId::generate(), draft, Utc::now());
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn attach_payment_intent(
        &self,
        order_id: OrderId,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;

        if orders.iter().any(|o| {
            o.id != order_id && o.payment_intent_id.as_deref() == Some(payment_intent_id)
        }) {
            return Err(RepositoryError::Conflict(format!(
                "payment intent {payment_intent_id} belongs to another order"
            )));
        }

        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(RepositoryError::NotFound)?;

        match order.payment_intent_id.as_deref() {
            Some(existing) if existing == payment_intent_id => {}
            Some(existing) => {
                return Err(RepositoryError::Conflict(format!(
                    "order {order_id} already has payment intent {existing}"
                )));
            }
            None => order.payment_intent_id = Some(payment_intent_id.to_string()),
        }

        Ok(order.clone())
    }

    async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, RepositoryError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(RepositoryError::NotFound)?;

        match plan_transition(order.status, status)? {
            Transition::AlreadyReached => Ok(StatusChange::Unchanged(order.clone())),
            Transition::Apply => {
                order.status = status;
                Ok(StatusChange::Updated(order.clone()))
            }
        }
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Order, RepositoryError> {
        self.check_available()?;
        self.orders
            .read()
            .await
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.check_available()?;
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .rev()
            .filter(|o| o.is_owned_by(user))
            .cloned()
            .collect();
        // Stable sort keeps later inserts first on equal timestamps.
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.check_available()?;
        self.orders
            .read()
            .await
            .iter()
            .find(|o| o.payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

/// A fixed catalog.
#[derive(Debug, Default)]
pub struct MemoryProductCatalog {
    products: Vec<Product>,
}

impl MemoryProductCatalog {
    /// Create a catalog holding `products`.
    #[must_use]
    pub fn new(mut products: Vec<Product>) -> Self {
        products.sort_by_key(|p| p.id);
        Self { products }
    }
}

#[async_trait]
impl ProductCatalog for MemoryProductCatalog {
    async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.clone())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}
