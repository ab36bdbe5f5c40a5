//! # Product Repository
//!
//! Database operations for the hotel product inventory.
//!
//! ## Stock Discipline
//! Stock is never read-then-written from here. The order repository
//! decrements stock with a conditional `UPDATE ... WHERE stock >= ?`
//! inside its own transaction; this repository only exposes the plain
//! CRUD surface plus an explicit restock operation.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::Product;

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Owning hotel, `None` for platform-owned stock.
    pub hotel_id: Option<String>,
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product.
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, name = %new.name, "Creating product");

        let product = Product {
            id: id.clone(),
            hotel_id: new.hotel_id,
            name: new.name,
            price_cents: new.price_cents,
            stock: new.stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, hotel_id, name, price_cents, stock, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.hotel_id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, hotel_id, name, price_cents, stock, is_active,
                   created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID, erroring if missing.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Lists active products for a hotel.
    pub async fn list_for_hotel(&self, hotel_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, hotel_id, name, price_cents, stock, is_active,
                   created_at, updated_at
            FROM products
            WHERE hotel_id = ?1 AND is_active = 1
            ORDER BY name
            "#,
        )
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Adds stock to a product (receiving inventory).
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock = stock + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deactivates a product (soft delete).
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn chai_product() -> NewProduct {
        NewProduct {
            hotel_id: Some("hotel-1".to_string()),
            name: "Chai".to_string(),
            price_cents: 5_000,
            stock: 10,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let created = repo.create(chai_product()).await.unwrap();
        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Chai");
        assert_eq!(fetched.price_cents, 5_000);
        assert_eq!(fetched.stock, 10);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_create_without_hotel() {
        let db = test_db().await;
        let repo = db.products();

        let created = repo
            .create(NewProduct {
                hotel_id: None,
                name: "Gift Wrap".to_string(),
                price_cents: 1_500,
                stock: 100,
            })
            .await
            .unwrap();

        let fetched = repo.require(&created.id).await.unwrap();
        assert_eq!(fetched.hotel_id, None);
        assert!(repo.list_for_hotel("hotel-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let db = test_db().await;
        let repo = db.products();

        assert!(repo.get_by_id("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_require_missing_errors() {
        let db = test_db().await;
        let repo = db.products();

        let err = repo.require("no-such-id").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_restock() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo.create(chai_product()).await.unwrap();
        repo.restock(&product.id, 5).await.unwrap();

        let fetched = repo.require(&product.id).await.unwrap();
        assert_eq!(fetched.stock, 15);
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_listing() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo.create(chai_product()).await.unwrap();
        assert_eq!(repo.list_for_hotel("hotel-1").await.unwrap().len(), 1);

        repo.deactivate(&product.id).await.unwrap();
        assert!(repo.list_for_hotel("hotel-1").await.unwrap().is_empty());
    }
}
