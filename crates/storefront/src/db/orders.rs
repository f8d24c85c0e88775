//! `PostgreSQL` order store.
//!
//! Items and the shipping address are stored as JSONB documents. Status
//! changes are compare-and-set updates (`WHERE status = <expected>`), so two
//! concurrent webhook deliveries can never both observe `pending` and both
//! report a write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use printshop_core::{CurrencyCode, OrderId, OrderStatus, UserId};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use super::RepositoryError;
use crate::models::{Order, OrderDraft, OrderItem, ShippingAddress};
use crate::store::{OrderStore, StatusChange, Transition, plan_transition};

/// Columns selected for every order query, in [`OrderRow`] order.
const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, total_amount, currency, \
                             status::text AS status, payment_intent_id, created_at";

/// Attempts at a compare-and-set status update before giving up.
const MAX_STATUS_ATTEMPTS: usize = 3;

/// Database row for `storefront.orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Option<i32>,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    total_amount: i64,
    currency: String,
    status: String,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;
        let status = row.status.parse::<OrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderId::from_uuid(row.id),
            user: row.user_id.map(UserId::new),
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            total_amount: row.total_amount,
            currency,
            status,
            payment_intent_id: row.payment_intent_id,
            created_at: row.created_at,
        })
    }
}

/// Order store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Conditionally move `order_id` from `expected` to `target`.
    ///
    /// Returns `None` if the row no longer has status `expected`.
    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.orders \
             SET status = $3::storefront.order_status \
             WHERE id = $1 AND status = $2::storefront.order_status \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(expected.as_str())
        .bind(target.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(skip(self, draft), fields(user = ?draft.user))]
    async fn create(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        draft.validate().map_err(RepositoryError::Validation)?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.orders \
             (id, user_id, items, shipping_address, total_amount, currency, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending') \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(OrderId::generate())
        .bind(draft.user.map(i32::from))
        .bind(Json(&draft.items))
        .bind(Json(&draft.shipping_address))
        .bind(draft.total_amount)
        .bind(draft.currency.code())
        .fetch_one(&self.pool)
        .await?;

        Order::try_from(row)
    }

    #[instrument(skip(self))]
    async fn attach_payment_intent(
        &self,
        order_id: OrderId,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError> {
        let result = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.orders SET payment_intent_id = $2 \
             WHERE id = $1 AND (payment_intent_id IS NULL OR payment_intent_id = $2) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(RepositoryError::Conflict(format!(
                    "payment intent {payment_intent_id} belongs to another order"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        match row {
            Some(row) => Order::try_from(row),
            None => match self.fetch_optional(order_id).await? {
                Some(order) => Err(RepositoryError::Conflict(format!(
                    "order {order_id} already has payment intent {}",
                    order.payment_intent_id.as_deref().unwrap_or_default()
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, RepositoryError> {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            let current = self
                .fetch_optional(order_id)
                .await?
                .ok_or(RepositoryError::NotFound)?;

            match plan_transition(current.status, status)? {
                Transition::AlreadyReached => return Ok(StatusChange::Unchanged(current)),
                Transition::Apply => {
                    if let Some(updated) = self
                        .compare_and_set_status(order_id, current.status, status)
                        .await?
                    {
                        return Ok(StatusChange::Updated(updated));
                    }
                    tracing::debug!(%order_id, "status changed concurrently, re-reading");
                }
            }
        }

        Err(RepositoryError::Conflict(format!(
            "order {order_id} status kept changing concurrently"
        )))
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Order, RepositoryError> {
        self.fetch_optional(order_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders \
             WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
