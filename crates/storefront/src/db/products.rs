//! `PostgreSQL` product catalog (read side).

use async_trait::async_trait;
use printshop_core::ProductId;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::Product;
use crate::store::ProductCatalog;

const PRODUCT_COLUMNS: &str =
    "id, name, category, price, description, main_image, additional_images, stock";

/// Product catalog backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    /// Create a new catalog reader.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.products ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().copied().map(i32::from).collect();
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.products WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }
}
