//! Product route handlers.
//!
//! The catalog is read-only over HTTP; the CLI seeds it.

use axum::{
    Json,
    extract::{Path, State},
};
use printshop_core::ProductId;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Response for the product listing.
#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub success: bool,
    pub products: Vec<Product>,
}

/// Response for a single product.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub product: Product,
}

/// List every product.
pub async fn index(State(state): State<AppState>) -> Result<Json<ProductsResponse>> {
    let products = state.catalog().list().await?;
    Ok(Json(ProductsResponse {
        success: true,
        products,
    }))
}

/// Show one product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>> {
    let not_found = || AppError::NotFound("product".to_string());
    let id = id.parse::<i32>().map(ProductId::new).map_err(|_| not_found())?;

    let product = state.catalog().get(id).await.map_err(|e| match AppError::from(e) {
        AppError::NotFound(_) => not_found(),
        other => other,
    })?;
    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}
