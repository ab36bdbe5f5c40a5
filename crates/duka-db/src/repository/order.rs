//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              create_order() - one transaction                   │
//! │                                                                 │
//! │  1. For each line:                                              │
//! │     ├── SELECT product (price snapshot, existence, active)      │
//! │     └── UPDATE products SET stock = stock - qty                 │
//! │            WHERE id = ? AND stock >= qty                        │
//! │         └── 0 rows → InsufficientStock → whole tx rolls back    │
//! │                                                                 │
//! │  2. INSERT order (code retried on collision, then NULL)         │
//! │  3. INSERT order_items (unit price frozen)                      │
//! │  4. COMMIT                                                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All-or-nothing: a failure at any step leaves stock, order and cart
//! exactly as they were.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::validation::validate_order_lines;
use duka_core::{
    CodeGenerator, Contact, CoreError, Order, OrderItem, OrderLine, OrderSource, OrderStatus,
    OrderWithItems, ORDER_CODE_MAX_ATTEMPTS,
};

/// Input for creating an inventory-backed order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub source: OrderSource,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    /// Present for cart checkout; recorded for traceability and
    /// cart-scoped settlement.
    pub cart_id: Option<String>,
    pub contact: Option<Contact>,
    pub lines: Vec<OrderLine>,
}

/// Input for creating a catalog order.
///
/// Catalog orders carry no `order_items` rows and decrement no stock;
/// the catalog product reference and the frozen unit price live on the
/// order itself.
#[derive(Debug, Clone)]
pub struct NewCatalogOrder {
    pub catalog_product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub contact: Option<Contact>,
}

/// Row shape for orders; `contact` is a JSON text column.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    code: Option<String>,
    status: OrderStatus,
    total_cents: i64,
    source: OrderSource,
    user_id: Option<String>,
    guest_id: Option<String>,
    cart_id: Option<String>,
    catalog_product_id: Option<String>,
    contact: Option<String>,
    fulfillment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> DbResult<Order> {
        let contact = match self.contact {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| DbError::CorruptJson {
                column: "orders.contact".to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(Order {
            id: self.id,
            code: self.code,
            status: self.status,
            total_cents: self.total_cents,
            source: self.source,
            user_id: self.user_id,
            guest_id: self.guest_id,
            cart_id: self.cart_id,
            catalog_product_id: self.catalog_product_id,
            contact,
            fulfillment_id: self.fulfillment_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, code, status, total_cents, source, user_id, guest_id, \
     cart_id, catalog_product_id, contact, fulfillment_id, created_at, updated_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates an order from product lines, decrementing stock.
    ///
    /// ## Errors
    /// * `Domain(ProductNotFound)` - a line names a missing or inactive product
    /// * `Domain(InsufficientStock)` - a line asks for more than is available
    ///
    /// Any error rolls back every stock decrement made so far. Cart
    /// status is not touched here; the checkout service confirms the
    /// cart after this commits.
    pub async fn create_order(
        &self,
        new: NewOrder,
        codes: &dyn CodeGenerator,
    ) -> DbResult<OrderWithItems> {
        validate_order_lines(&new.lines).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Reserve stock line by line; prices are frozen from the same
        // read that proves the product exists.
        let mut total_cents: i64 = 0;
        let mut priced_lines: Vec<(OrderLine, i64)> = Vec::with_capacity(new.lines.len());

        for line in &new.lines {
            let product: Option<(String, i64, i64)> = sqlx::query_as(
                r#"
                SELECT name, price_cents, stock
                FROM products
                WHERE id = ?1 AND is_active = 1
                "#,
            )
            .bind(&line.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let (name, price_cents, stock) = match product {
                Some(p) => p,
                None => return Err(CoreError::ProductNotFound(line.product_id.clone()).into()),
            };

            let decrement = sqlx::query(
                r#"
                UPDATE products SET
                    stock = stock - ?2,
                    updated_at = ?3
                WHERE id = ?1 AND stock >= ?2
                "#,
            )
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if decrement.rows_affected() == 0 {
                return Err(CoreError::InsufficientStock {
                    name,
                    available: stock,
                    requested: line.quantity,
                }
                .into());
            }

            total_cents += price_cents * line.quantity;
            priced_lines.push((line.clone(), price_cents));
        }

        let order_id = Uuid::new_v4().to_string();
        let contact_json = encode_contact(&new.contact)?;

        let code = insert_order(
            &mut tx,
            codes,
            InsertOrder {
                id: &order_id,
                status: OrderStatus::NotPaid,
                total_cents,
                source: new.source,
                user_id: new.user_id.as_deref(),
                guest_id: new.guest_id.as_deref(),
                cart_id: new.cart_id.as_deref(),
                catalog_product_id: None,
                contact_json: contact_json.as_deref(),
                now,
            },
        )
        .await?;

        let mut items = Vec::with_capacity(priced_lines.len());
        for (line, unit_price_cents) in priced_lines {
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents,
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, quantity, unit_price_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        debug!(
            order_id = %order_id,
            total_cents,
            lines = items.len(),
            "Order created"
        );

        Ok(OrderWithItems {
            order: Order {
                id: order_id,
                code,
                status: OrderStatus::NotPaid,
                total_cents,
                source: new.source,
                user_id: new.user_id,
                guest_id: new.guest_id,
                cart_id: new.cart_id,
                catalog_product_id: None,
                contact: new.contact,
                fulfillment_id: None,
                created_at: now,
                updated_at: now,
            },
            items,
        })
    }

    /// Creates a catalog order. No stock is touched.
    pub async fn create_catalog_order(
        &self,
        new: NewCatalogOrder,
        codes: &dyn CodeGenerator,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let order_id = Uuid::new_v4().to_string();
        let total_cents = new.unit_price_cents * new.quantity;
        let contact_json = encode_contact(&new.contact)?;

        let code = insert_order(
            &mut tx,
            codes,
            InsertOrder {
                id: &order_id,
                status: OrderStatus::NotPaid,
                total_cents,
                source: OrderSource::Catalog,
                user_id: new.user_id.as_deref(),
                guest_id: new.guest_id.as_deref(),
                cart_id: None,
                catalog_product_id: Some(&new.catalog_product_id),
                contact_json: contact_json.as_deref(),
                now,
            },
        )
        .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, total_cents, "Catalog order created");

        Ok(Order {
            id: order_id,
            code,
            status: OrderStatus::NotPaid,
            total_cents,
            source: OrderSource::Catalog,
            user_id: new.user_id,
            guest_id: new.guest_id,
            cart_id: None,
            catalog_product_id: Some(new.catalog_product_id),
            contact: new.contact,
            fulfillment_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Gets an order by ID, erroring if missing.
    pub async fn require(&self, id: &str) -> DbResult<Order> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Gets an order together with its items.
    pub async fn get_with_items(&self, id: &str) -> DbResult<Option<OrderWithItems>> {
        let order = match self.get_by_id(id).await? {
            Some(order) => order,
            None => return Ok(None),
        };

        let items = self.items(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Gets all items of an order, oldest first.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Finds an order by its short code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Lists orders checked out from a cart.
    pub async fn list_for_cart(&self, cart_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE cart_id = ?1 ORDER BY created_at"
        ))
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Moves an order to `pending` (payment initiated).
    ///
    /// Only `not_paid` orders move; anything else is left alone and
    /// `Ok(false)` is returned.
    pub async fn mark_pending(&self, order_id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'pending', updated_at = ?2
            WHERE id = ?1 AND status = 'not_paid'
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a single order paid. `not_paid` and `pending` orders move;
    /// already-paid or canceled orders are left alone.
    pub async fn mark_paid(&self, order_id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'paid', updated_at = ?2
            WHERE id = ?1 AND status IN ('not_paid', 'pending')
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks every unpaid order of a cart paid and completes the cart.
    ///
    /// Used for cart-scoped settlement: an M-Pesa payment initiated for
    /// a cart settles all of its orders at once. The cart completes
    /// whether or not the post-checkout confirmation landed, so a
    /// settled cart can never be left `active`.
    ///
    /// ## Returns
    /// Number of orders moved to `paid`.
    pub async fn mark_paid_for_cart(&self, cart_id: &str) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let orders = sqlx::query(
            r#"
            UPDATE orders SET status = 'paid', updated_at = ?2
            WHERE cart_id = ?1 AND status IN ('not_paid', 'pending')
            "#,
        )
        .bind(cart_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE carts SET status = 'completed', updated_at = ?2
            WHERE id = ?1 AND status IN ('active', 'confirmed')
            "#,
        )
        .bind(cart_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(orders.rows_affected())
    }

    /// Attaches guest contact details to an order.
    pub async fn attach_contact(&self, order_id: &str, contact: &Contact) -> DbResult<()> {
        let now = Utc::now();
        let json = serde_json::to_string(contact).map_err(|e| DbError::CorruptJson {
            column: "orders.contact".to_string(),
            message: e.to_string(),
        })?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET contact = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }

    /// Stamps the fulfillment id onto an order. Best-effort: a missing
    /// order is logged, not raised, because assignment runs after the
    /// order transaction has already committed.
    pub async fn set_fulfillment(&self, order_id: &str, fulfillment_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders SET fulfillment_id = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(fulfillment_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(order_id = %order_id, "Fulfillment stamp found no order");
        }

        Ok(())
    }
}

struct InsertOrder<'a> {
    id: &'a str,
    status: OrderStatus,
    total_cents: i64,
    source: OrderSource,
    user_id: Option<&'a str>,
    guest_id: Option<&'a str>,
    cart_id: Option<&'a str>,
    catalog_product_id: Option<&'a str>,
    contact_json: Option<&'a str>,
    now: DateTime<Utc>,
}

/// Inserts the order row, retrying the short code on collision.
///
/// Each attempt generates a fresh code; after the attempts are
/// exhausted the order is inserted with a NULL code. A failed INSERT
/// does not abort the surrounding SQLite transaction, so retrying in
/// place is safe.
async fn insert_order(
    tx: &mut Transaction<'_, Sqlite>,
    codes: &dyn CodeGenerator,
    order: InsertOrder<'_>,
) -> DbResult<Option<String>> {
    for attempt in 0..=ORDER_CODE_MAX_ATTEMPTS {
        let code = if attempt < ORDER_CODE_MAX_ATTEMPTS {
            Some(codes.generate())
        } else {
            warn!(order_id = %order.id, "Order code kept colliding; storing without code");
            None
        };

        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, code, status, total_cents, source,
                user_id, guest_id, cart_id, catalog_product_id,
                contact, fulfillment_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?11)
            "#,
        )
        .bind(order.id)
        .bind(&code)
        .bind(order.status)
        .bind(order.total_cents)
        .bind(order.source)
        .bind(order.user_id)
        .bind(order.guest_id)
        .bind(order.cart_id)
        .bind(order.catalog_product_id)
        .bind(order.contact_json)
        .bind(order.now)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => return Ok(code),
            Err(e) => {
                let db_err: DbError = e.into();
                if code.is_some() && db_err.is_unique_violation() {
                    debug!(order_id = %order.id, attempt, "Order code collision, retrying");
                    continue;
                }
                return Err(db_err);
            }
        }
    }

    // Unreachable: the NULL-code attempt either inserts or errors above.
    Err(DbError::Internal("order insert retries exhausted".to_string()))
}

fn encode_contact(contact: &Option<Contact>) -> DbResult<Option<String>> {
    contact
        .as_ref()
        .map(|c| {
            serde_json::to_string(c).map_err(|e| DbError::CorruptJson {
                column: "orders.contact".to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use duka_core::{CartStatus, RandomCodeGenerator};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seeded_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> String {
        db.products()
            .create(NewProduct {
                hotel_id: Some("hotel-1".to_string()),
                name: name.to_string(),
                price_cents,
                stock,
            })
            .await
            .unwrap()
            .id
    }

    fn new_order(lines: Vec<OrderLine>) -> NewOrder {
        NewOrder {
            source: OrderSource::Ecom,
            user_id: Some("user-1".to_string()),
            guest_id: None,
            cart_id: None,
            contact: None,
            lines,
        }
    }

    #[tokio::test]
    async fn test_create_order_decrements_stock_and_totals() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;
        let mandazi = seeded_product(&db, "Mandazi", 2_000, 20).await;

        let codes = RandomCodeGenerator;
        let created = db
            .orders()
            .create_order(
                new_order(vec![OrderLine::new(&chai, 2), OrderLine::new(&mandazi, 3)]),
                &codes,
            )
            .await
            .unwrap();

        // 2*5000 + 3*2000
        assert_eq!(created.order.total_cents, 16_000);
        assert_eq!(created.order.status, OrderStatus::NotPaid);
        assert_eq!(created.items.len(), 2);
        assert!(created.order.code.is_some());

        assert_eq!(db.products().require(&chai).await.unwrap().stock, 8);
        assert_eq!(db.products().require(&mandazi).await.unwrap().stock, 17);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;
        let scarce = seeded_product(&db, "Samosa", 3_000, 1).await;

        let codes = RandomCodeGenerator;
        let err = db
            .orders()
            .create_order(
                new_order(vec![OrderLine::new(&chai, 2), OrderLine::new(&scarce, 5)]),
                &codes,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { requested: 5, .. })
        ));

        // First line's decrement must have been rolled back.
        assert_eq!(db.products().require(&chai).await.unwrap().stock, 10);
        assert_eq!(db.products().require(&scarce).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_unknown_product_fails() {
        let db = test_db().await;
        let codes = RandomCodeGenerator;

        let err = db
            .orders()
            .create_order(new_order(vec![OrderLine::new("no-such", 1)]), &codes)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_lines_rejected() {
        let db = test_db().await;
        let codes = RandomCodeGenerator;

        let err = db
            .orders()
            .create_order(new_order(vec![]), &codes)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_price_change() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;

        let codes = RandomCodeGenerator;
        let created = db
            .orders()
            .create_order(new_order(vec![OrderLine::new(&chai, 1)]), &codes)
            .await
            .unwrap();

        sqlx::query("UPDATE products SET price_cents = 9999 WHERE id = ?1")
            .bind(&chai)
            .execute(db.pool())
            .await
            .unwrap();

        let items = db.orders().items(&created.order.id).await.unwrap();
        assert_eq!(items[0].unit_price_cents, 5_000);
    }

    #[tokio::test]
    async fn test_code_collision_falls_back_to_null() {
        // A generator that always produces the same code forces every
        // retry to collide once the first order holds it.
        struct Fixed;
        impl CodeGenerator for Fixed {
            fn generate(&self) -> String {
                "AAAAA".to_string()
            }
        }

        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;
        let codes = Fixed;

        let first = db
            .orders()
            .create_order(new_order(vec![OrderLine::new(&chai, 1)]), &codes)
            .await
            .unwrap();
        assert_eq!(first.order.code.as_deref(), Some("AAAAA"));

        let second = db
            .orders()
            .create_order(new_order(vec![OrderLine::new(&chai, 1)]), &codes)
            .await
            .unwrap();
        assert!(second.order.code.is_none());
    }

    #[tokio::test]
    async fn test_find_by_code() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;

        let codes = RandomCodeGenerator;
        let created = db
            .orders()
            .create_order(new_order(vec![OrderLine::new(&chai, 1)]), &codes)
            .await
            .unwrap();

        let code = created.order.code.clone().unwrap();
        let found = db.orders().find_by_code(&code).await.unwrap().unwrap();
        assert_eq!(found.id, created.order.id);
    }

    #[tokio::test]
    async fn test_cart_id_is_recorded() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;
        let cart = db.carts().get_or_create_active("user-1").await.unwrap();

        let codes = RandomCodeGenerator;
        let mut input = new_order(vec![OrderLine::new(&chai, 1)]);
        input.cart_id = Some(cart.id.clone());

        let created = db.orders().create_order(input, &codes).await.unwrap();
        let for_cart = db.orders().list_for_cart(&cart.id).await.unwrap();

        assert_eq!(for_cart.len(), 1);
        assert_eq!(for_cart[0].id, created.order.id);
    }

    #[tokio::test]
    async fn test_mark_paid_transitions() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;

        let codes = RandomCodeGenerator;
        let created = db
            .orders()
            .create_order(new_order(vec![OrderLine::new(&chai, 1)]), &codes)
            .await
            .unwrap();

        assert!(db.orders().mark_pending(&created.order.id).await.unwrap());
        assert!(db.orders().mark_paid(&created.order.id).await.unwrap());

        // Already paid: idempotent no-op.
        assert!(!db.orders().mark_paid(&created.order.id).await.unwrap());

        let order = db.orders().require(&created.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_mark_paid_for_cart_settles_all_and_completes_cart() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;
        let cart = db.carts().get_or_create_active("user-1").await.unwrap();

        let codes = RandomCodeGenerator;
        let mut input = new_order(vec![OrderLine::new(&chai, 1)]);
        input.cart_id = Some(cart.id.clone());
        db.orders().create_order(input, &codes).await.unwrap();

        let paid = db.orders().mark_paid_for_cart(&cart.id).await.unwrap();
        assert_eq!(paid, 1);

        let cart = db.carts().require(&cart.id).await.unwrap();
        assert_eq!(cart.status, CartStatus::Completed);

        // Redelivery settles nothing further.
        assert_eq!(db.orders().mark_paid_for_cart(&cart.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_catalog_order_touches_no_stock() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;

        let codes = RandomCodeGenerator;
        let order = db
            .orders()
            .create_catalog_order(
                NewCatalogOrder {
                    catalog_product_id: "cat-1".to_string(),
                    quantity: 2,
                    unit_price_cents: 30_000,
                    user_id: None,
                    guest_id: Some("guest-1".to_string()),
                    contact: None,
                },
                &codes,
            )
            .await
            .unwrap();

        assert_eq!(order.total_cents, 60_000);
        assert_eq!(order.source, OrderSource::Catalog);
        assert!(db.orders().items(&order.id).await.unwrap().is_empty());
        assert_eq!(db.products().require(&chai).await.unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_contact_round_trips_through_json_column() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 5_000, 10).await;

        let codes = RandomCodeGenerator;
        let mut input = new_order(vec![OrderLine::new(&chai, 1)]);
        input.user_id = None;
        input.guest_id = Some("guest-1".to_string());
        input.contact = Some(Contact {
            guest_id: Some("guest-1".to_string()),
            name: Some("Asha".to_string()),
            phone: Some("254712345678".to_string()),
            email: None,
        });

        let created = db.orders().create_order(input, &codes).await.unwrap();
        let fetched = db.orders().require(&created.order.id).await.unwrap();

        let contact = fetched.contact.unwrap();
        assert_eq!(contact.name.as_deref(), Some("Asha"));
        assert_eq!(contact.phone.as_deref(), Some("254712345678"));
    }
}
