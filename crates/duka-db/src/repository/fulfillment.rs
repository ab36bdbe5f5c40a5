//! # Fulfillment Repository
//!
//! Database operations for order fulfillment assignments.
//!
//! One fulfillment row per order (UNIQUE on `order_id`); the payout
//! math is stored alongside as a JSON breakdown so the numbers the
//! assigner saw are auditable later even if prices move.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::{FulfillmentStatus, OrderFulfillment, PayoutStatus, PriceBreakdown};

/// Input for recording a fulfillment assignment.
#[derive(Debug, Clone)]
pub struct NewFulfillment {
    pub order_id: String,
    pub assigned_hotel_id: Option<String>,
    pub assigned_product_id: Option<String>,
    pub price_breakdown: PriceBreakdown,
}

/// Row shape; `price_breakdown` is a JSON text column.
#[derive(Debug, sqlx::FromRow)]
struct FulfillmentRow {
    id: String,
    order_id: String,
    assigned_hotel_id: Option<String>,
    assigned_product_id: Option<String>,
    assigned_at: Option<DateTime<Utc>>,
    status: FulfillmentStatus,
    price_breakdown: String,
    payout_status: PayoutStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FulfillmentRow {
    fn into_fulfillment(self) -> DbResult<OrderFulfillment> {
        let price_breakdown =
            serde_json::from_str(&self.price_breakdown).map_err(|e| DbError::CorruptJson {
                column: "order_fulfillments.price_breakdown".to_string(),
                message: e.to_string(),
            })?;

        Ok(OrderFulfillment {
            id: self.id,
            order_id: self.order_id,
            assigned_hotel_id: self.assigned_hotel_id,
            assigned_product_id: self.assigned_product_id,
            assigned_at: self.assigned_at,
            status: self.status,
            price_breakdown,
            payout_status: self.payout_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for fulfillment database operations.
#[derive(Debug, Clone)]
pub struct FulfillmentRepository {
    pool: SqlitePool,
}

impl FulfillmentRepository {
    /// Creates a new FulfillmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FulfillmentRepository { pool }
    }

    /// Records an assignment for an order.
    ///
    /// Fails with a unique violation if the order already has one.
    pub async fn create(&self, new: NewFulfillment) -> DbResult<OrderFulfillment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            id = %id,
            order_id = %new.order_id,
            hotel_id = ?new.assigned_hotel_id,
            "Recording fulfillment assignment"
        );

        let breakdown_json =
            serde_json::to_string(&new.price_breakdown).map_err(|e| DbError::CorruptJson {
                column: "order_fulfillments.price_breakdown".to_string(),
                message: e.to_string(),
            })?;

        let fulfillment = OrderFulfillment {
            id: id.clone(),
            order_id: new.order_id,
            assigned_hotel_id: new.assigned_hotel_id,
            assigned_product_id: new.assigned_product_id,
            assigned_at: Some(now),
            status: FulfillmentStatus::Assigned,
            price_breakdown: new.price_breakdown,
            payout_status: PayoutStatus::Unpaid,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO order_fulfillments (
                id, order_id, assigned_hotel_id, assigned_product_id,
                assigned_at, status, price_breakdown, payout_status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&fulfillment.id)
        .bind(&fulfillment.order_id)
        .bind(&fulfillment.assigned_hotel_id)
        .bind(&fulfillment.assigned_product_id)
        .bind(fulfillment.assigned_at)
        .bind(fulfillment.status)
        .bind(&breakdown_json)
        .bind(fulfillment.payout_status)
        .bind(fulfillment.created_at)
        .bind(fulfillment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(fulfillment)
    }

    /// Gets the fulfillment for an order, if assigned.
    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<OrderFulfillment>> {
        let row = sqlx::query_as::<_, FulfillmentRow>(
            r#"
            SELECT id, order_id, assigned_hotel_id, assigned_product_id,
                   assigned_at, status, price_breakdown, payout_status,
                   created_at, updated_at
            FROM order_fulfillments
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FulfillmentRow::into_fulfillment).transpose()
    }

    /// Marks the hotel payout as settled.
    pub async fn mark_payout_paid(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE order_fulfillments SET payout_status = 'paid', updated_at = ?2
            WHERE id = ?1 AND payout_status = 'unpaid'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OrderFulfillment (unpaid)", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
