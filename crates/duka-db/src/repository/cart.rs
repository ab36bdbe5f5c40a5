//! # Cart Repository
//!
//! Database operations for carts and cart items.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Cart Lifecycle                          │
//! │                                                              │
//! │  1. GET OR CREATE                                            │
//! │     └── get_or_create_active(owner) → Cart { Active }        │
//! │         (at most one active cart per owner, enforced by a    │
//! │          partial unique index)                               │
//! │                                                              │
//! │  2. EDIT                                                     │
//! │     └── add_item() / set_item_quantity() / remove_item()     │
//! │                                                              │
//! │  3. CHECKOUT (checkout service)                              │
//! │     └── transition(Active → Confirmed) best-effort after the │
//! │         order transaction commits; a failed checkout leaves  │
//! │         the cart active and retryable                        │
//! │                                                              │
//! │  4. SETTLE (order repository)                                │
//! │     └── cart completes when its orders are marked paid       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::{Cart, CartItem, CartStatus};

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the owner's active cart, creating one if none exists.
    ///
    /// ## Concurrency
    /// Two concurrent callers may both miss the SELECT and race the
    /// INSERT; the partial unique index rejects the loser, who then
    /// re-reads the winner's cart.
    pub async fn get_or_create_active(&self, owner_id: &str) -> DbResult<Cart> {
        if let Some(cart) = self.find_active(owner_id).await? {
            return Ok(cart);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, owner_id = %owner_id, "Creating active cart");

        let insert = sqlx::query(
            r#"
            INSERT INTO carts (id, owner_id, status, created_at, updated_at)
            VALUES (?1, ?2, 'active', ?3, ?3)
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(now)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(_) => Ok(Cart {
                id,
                owner_id: owner_id.to_string(),
                status: CartStatus::Active,
                created_at: now,
                updated_at: now,
            }),
            Err(e) => {
                let db_err: DbError = e.into();
                if db_err.is_unique_violation() {
                    // Lost the race; the other writer's cart is ours too.
                    self.find_active(owner_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Cart (active)", owner_id))
                } else {
                    Err(db_err)
                }
            }
        }
    }

    /// Finds the owner's active cart, if any.
    pub async fn find_active(&self, owner_id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, owner_id, status, created_at, updated_at
            FROM carts
            WHERE owner_id = ?1 AND status = 'active'
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets a cart by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, owner_id, status, created_at, updated_at
            FROM carts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets a cart by ID, erroring if missing.
    pub async fn require(&self, id: &str) -> DbResult<Cart> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", id))
    }

    /// Adds a product to a cart.
    ///
    /// If the cart already has a line for this product, its quantity is
    /// incremented instead of inserting a duplicate line.
    pub async fn add_item(&self, cart_id: &str, product_id: &str, quantity: i64) -> DbResult<CartItem> {
        debug!(cart_id = %cart_id, product_id = %product_id, quantity, "Adding cart item");

        let existing = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, cart_id, product_id, quantity, status, created_at
            FROM cart_items
            WHERE cart_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(mut item) = existing {
            item.quantity += quantity;
            sqlx::query("UPDATE cart_items SET quantity = ?2 WHERE id = ?1")
                .bind(&item.id)
                .bind(item.quantity)
                .execute(&self.pool)
                .await?;
            return Ok(item);
        }

        let item = CartItem {
            id: Uuid::new_v4().to_string(),
            cart_id: cart_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            status: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.cart_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(&item.status)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets all items in a cart, oldest first.
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, cart_id, product_id, quantity, status, created_at
            FROM cart_items
            WHERE cart_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sets the quantity of a cart item.
    pub async fn set_item_quantity(&self, item_id: &str, quantity: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE cart_items SET quantity = ?2 WHERE id = ?1")
            .bind(item_id)
            .bind(quantity)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", item_id));
        }

        Ok(())
    }

    /// Removes an item from a cart.
    pub async fn remove_item(&self, item_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", item_id));
        }

        Ok(())
    }

    /// Transitions a cart from one status to another.
    ///
    /// The `from` status is part of the WHERE clause, so a cart that has
    /// already moved on is left untouched and `Ok(false)` is returned.
    pub async fn transition(&self, cart_id: &str, from: CartStatus, to: CartStatus) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE carts SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(cart_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    // Cart items reference real products; tests must seed one first.
    async fn seed_product(db: &Database) -> String {
        db.products()
            .create(NewProduct {
                hotel_id: Some("hotel-1".to_string()),
                name: "Chai".to_string(),
                price_cents: 5_000,
                stock: 10,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let db = test_db().await;
        let repo = db.carts();

        let first = repo.get_or_create_active("user-1").await.unwrap();
        let second = repo.get_or_create_active("user-1").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, CartStatus::Active);
    }

    #[tokio::test]
    async fn test_different_owners_get_different_carts() {
        let db = test_db().await;
        let repo = db.carts();

        let a = repo.get_or_create_active("user-1").await.unwrap();
        let b = repo.get_or_create_active("user-2").await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_add_item_merges_duplicate_product() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create_active("user-1").await.unwrap();
        let product_id = seed_product(&db).await;

        repo.add_item(&cart.id, &product_id, 2).await.unwrap();
        repo.add_item(&cart.id, &product_id, 3).await.unwrap();

        let items = repo.items(&cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_remove_item() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create_active("user-1").await.unwrap();
        let product_id = seed_product(&db).await;

        let item = repo.add_item(&cart.id, &product_id, 1).await.unwrap();
        repo.remove_item(&item.id).await.unwrap();

        assert!(repo.items(&cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_requires_current_status() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create_active("user-1").await.unwrap();

        let moved = repo
            .transition(&cart.id, CartStatus::Active, CartStatus::Confirmed)
            .await
            .unwrap();
        assert!(moved);

        // Second attempt finds no active cart to move.
        let moved_again = repo
            .transition(&cart.id, CartStatus::Active, CartStatus::Confirmed)
            .await
            .unwrap();
        assert!(!moved_again);
    }

    #[tokio::test]
    async fn test_confirmed_cart_frees_owner_for_a_new_one() {
        let db = test_db().await;
        let repo = db.carts();

        let first = repo.get_or_create_active("user-1").await.unwrap();
        repo.transition(&first.id, CartStatus::Active, CartStatus::Confirmed)
            .await
            .unwrap();

        let second = repo.get_or_create_active("user-1").await.unwrap();
        assert_ne!(first.id, second.id);
    }
}
