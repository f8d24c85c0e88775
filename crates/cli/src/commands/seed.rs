//! Seed the print catalog from a YAML file.
//!
//! The file is parsed and validated in full before the database is touched,
//! and all inserts run in one transaction.
//!
//! ```yaml
//! products:
//!   - name: Midnight Harbour
//!     category: Landscapes
//!     price: 300
//!     description: Giclée print on 300 g cotton rag.
//!     main_image: /images/prints/midnight-harbour.jpg
//!     additional_images:
//!       - /images/prints/midnight-harbour-detail.jpg
//!     stock: 25
//! ```

use std::path::Path;

use printshop_storefront::db;
use serde::Deserialize;
use tracing::{error, info};

/// A catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<ProductSeed>,
}

/// One product to insert.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub category: String,
    /// Price in major currency units.
    pub price: i64,
    #[serde(default)]
    pub description: String,
    pub main_image: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
}

/// Check every product, returning one message per problem.
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();

    if catalog.products.is_empty() {
        errors.push("catalog contains no products".to_string());
    }

    for (index, product) in catalog.products.iter().enumerate() {
        let label = if product.name.trim().is_empty() {
            format!("products[{index}]")
        } else {
            format!("products[{index}] ({})", product.name)
        };

        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if product.category.trim().is_empty() {
            errors.push(format!("{label}: category is empty"));
        }
        if product.price < 0 {
            errors.push(format!("{label}: price must not be negative"));
        }
        if product.stock < 0 {
            errors.push(format!("{label}: stock must not be negative"));
        }
        if product.main_image.trim().is_empty() {
            errors.push(format!("{label}: main_image is empty"));
        }
    }

    errors
}

/// Seed products from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML catalog
/// * `clear_existing` - If true, delete existing products first
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or fails validation, or database operations fail.
pub async fn products(
    file_path: &str,
    clear_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("STOREFRONT_DATABASE_URL not set")?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    info!(products = catalog.products.len(), "Parsed catalog");

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let mut tx = pool.begin().await?;

    if clear_existing {
        let deleted = sqlx::query("DELETE FROM storefront.products")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        info!(deleted, "Cleared existing products");
    }

    for product in &catalog.products {
        sqlx::query(
            r"
            INSERT INTO storefront.products
                (name, category, price, description, main_image, additional_images, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.main_image)
        .bind(&product.additional_images)
        .bind(product.stock)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!("Seeding complete!");
    info!("  Products inserted: {}", catalog.products.len());

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_is_valid() {
        let content = include_str!("../../seed/products.yaml");
        let catalog: CatalogFile = serde_yaml::from_str(content).unwrap();

        assert!(!catalog.products.is_empty());
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_validation_reports_each_problem() {
        let catalog: CatalogFile = serde_yaml::from_str(
            r"
products:
  - name: ''
    category: Abstract
    price: -1
    main_image: /a.jpg
  - name: Fjord
    category: ''
    price: 100
    main_image: ''
    stock: -2
",
        )
        .unwrap();

        assert_eq!(
            validate_catalog(&catalog),
            vec![
                "products[0]: name is empty",
                "products[0]: price must not be negative",
                "products[1] (Fjord): category is empty",
                "products[1] (Fjord): stock must not be negative",
                "products[1] (Fjord): main_image is empty",
            ]
        );
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let catalog = CatalogFile { products: vec![] };
        assert_eq!(validate_catalog(&catalog).len(), 1);
    }
}
