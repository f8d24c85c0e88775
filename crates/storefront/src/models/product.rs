//! Catalog product read model.

use printshop_core::ProductId;
use serde::{Deserialize, Serialize};

/// A print in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Price in major currency units.
    pub price: i64,
    pub description: String,
    pub main_image: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
    pub stock: i32,
}

/// The product fields embedded in an order detail response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub main_image: String,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            main_image: product.main_image.clone(),
        }
    }
}
