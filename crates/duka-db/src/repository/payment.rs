//! # Payment Repository
//!
//! Database operations for payment records.
//!
//! ## Settlement
//! A payment moves from `pending` to a terminal status exactly once.
//! `settle()` is a single conditional UPDATE:
//!
//! ```text
//! UPDATE payments SET status = <terminal>, ...
//! WHERE id = ? AND status = 'pending'
//! ```
//!
//! 0 rows affected means the payment was already terminal; callback
//! redelivery therefore cannot flip a completed payment to failed or
//! settle the same money twice.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::{Payment, PaymentStatus};

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub provider: String,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub raw: Option<serde_json::Value>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub hotel_id: Option<String>,
    pub cart_id: Option<String>,
    pub initiated_checkout_request_id: Option<String>,
    pub initiated_merchant_request_id: Option<String>,
}

/// Result of a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call moved the payment to the terminal status.
    Settled,
    /// The payment was already terminal; nothing changed.
    AlreadyTerminal,
}

/// Row shape for payments; `raw` is a JSON text column.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    provider: String,
    provider_transaction_id: Option<String>,
    amount_cents: i64,
    status: PaymentStatus,
    raw: Option<String>,
    order_id: Option<String>,
    user_id: Option<String>,
    hotel_id: Option<String>,
    cart_id: Option<String>,
    initiated_checkout_request_id: Option<String>,
    initiated_merchant_request_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<Payment> {
        let raw = match self.raw {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| DbError::CorruptJson {
                column: "payments.raw".to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(Payment {
            id: self.id,
            provider: self.provider,
            provider_transaction_id: self.provider_transaction_id,
            amount_cents: self.amount_cents,
            status: self.status,
            raw,
            order_id: self.order_id,
            user_id: self.user_id,
            hotel_id: self.hotel_id,
            cart_id: self.cart_id,
            initiated_checkout_request_id: self.initiated_checkout_request_id,
            initiated_merchant_request_id: self.initiated_merchant_request_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, provider, provider_transaction_id, amount_cents, status, raw, \
     order_id, user_id, hotel_id, cart_id, \
     initiated_checkout_request_id, initiated_merchant_request_id, \
     created_at, updated_at";

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment.
    pub async fn create(&self, new: NewPayment) -> DbResult<Payment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            id = %id,
            provider = %new.provider,
            amount_cents = new.amount_cents,
            "Recording payment"
        );

        let raw_json = encode_raw(&new.raw)?;

        let payment = Payment {
            id: id.clone(),
            provider: new.provider,
            provider_transaction_id: None,
            amount_cents: new.amount_cents,
            status: new.status,
            raw: new.raw,
            order_id: new.order_id,
            user_id: new.user_id,
            hotel_id: new.hotel_id,
            cart_id: new.cart_id,
            initiated_checkout_request_id: new.initiated_checkout_request_id,
            initiated_merchant_request_id: new.initiated_merchant_request_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, provider, provider_transaction_id, amount_cents, status, raw,
                order_id, user_id, hotel_id, cart_id,
                initiated_checkout_request_id, initiated_merchant_request_id,
                created_at, updated_at
            ) VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.provider)
        .bind(payment.amount_cents)
        .bind(payment.status)
        .bind(&raw_json)
        .bind(&payment.order_id)
        .bind(&payment.user_id)
        .bind(&payment.hotel_id)
        .bind(&payment.cart_id)
        .bind(&payment.initiated_checkout_request_id)
        .bind(&payment.initiated_merchant_request_id)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRow::into_payment).transpose()
    }

    /// Gets a payment by ID, erroring if missing.
    pub async fn require(&self, id: &str) -> DbResult<Payment> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))
    }

    /// Finds the payment a provider initiated with this checkout
    /// request id, whatever its status. The primary callback matching
    /// path: a redelivered callback must find the already-terminal row,
    /// not fall through and insert a duplicate.
    pub async fn find_by_checkout_request(
        &self,
        provider: &str,
        checkout_request_id: &str,
    ) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE provider = ?1
              AND initiated_checkout_request_id = ?2
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(provider)
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRow::into_payment).transpose()
    }

    /// Lists all payments for a provider, newest first.
    ///
    /// The fallback matching path scans these rows' raw payloads for a
    /// checkout request id recorded before the correlation columns
    /// existed.
    pub async fn list_for_provider(&self, provider: &str) -> DbResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE provider = ?1
            ORDER BY created_at DESC
            "#
        ))
        .bind(provider)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    /// Moves a pending payment to a terminal status.
    ///
    /// Stores the provider receipt and merges the callback payload into
    /// `raw` under the `callback` key. Guarded on `status = 'pending'`,
    /// so redelivered callbacks report [`SettleOutcome::AlreadyTerminal`]
    /// and change nothing.
    pub async fn settle(
        &self,
        id: &str,
        terminal: PaymentStatus,
        provider_transaction_id: Option<&str>,
        callback_payload: &serde_json::Value,
    ) -> DbResult<SettleOutcome> {
        debug_assert!(terminal.is_terminal());

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Merge inside the transaction so a concurrent settle cannot
        // interleave between the read and the guarded write.
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT raw FROM payments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let raw = match raw {
            Some(r) => r,
            None => return Err(DbError::not_found("Payment", id)),
        };

        let mut merged: serde_json::Value = match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| DbError::CorruptJson {
                column: "payments.raw".to_string(),
                message: e.to_string(),
            })?,
            None => serde_json::json!({}),
        };
        if let Some(map) = merged.as_object_mut() {
            map.insert("callback".to_string(), callback_payload.clone());
        }
        let merged_json = encode_raw(&Some(merged))?;

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = ?2,
                provider_transaction_id = ?3,
                raw = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(terminal)
        .bind(provider_transaction_id)
        .bind(&merged_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Already terminal: drop the merge, keep the original row.
            tx.rollback().await?;
            return Ok(SettleOutcome::AlreadyTerminal);
        }

        tx.commit().await?;
        Ok(SettleOutcome::Settled)
    }
}

fn encode_raw(raw: &Option<serde_json::Value>) -> DbResult<Option<String>> {
    raw.as_ref()
        .map(|v| {
            serde_json::to_string(v).map_err(|e| DbError::CorruptJson {
                column: "payments.raw".to_string(),
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
    use serde_json::json;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn pending_mpesa(checkout_request_id: &str) -> NewPayment {
        NewPayment {
            provider: "mpesa".to_string(),
            amount_cents: 16_000,
            status: PaymentStatus::Pending,
            raw: Some(json!({ "initiated": { "CheckoutRequestID": checkout_request_id } })),
            order_id: Some("order-1".to_string()),
            user_id: Some("user-1".to_string()),
            hotel_id: None,
            cart_id: None,
            initiated_checkout_request_id: Some(checkout_request_id.to_string()),
            initiated_merchant_request_id: Some("mr-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_checkout_request() {
        let db = test_db().await;
        let repo = db.payments();

        let created = repo.create(pending_mpesa("ws_CO_123")).await.unwrap();
        let found = repo
            .find_by_checkout_request("mpesa", "ws_CO_123")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_settle_completes_and_merges_raw() {
        let db = test_db().await;
        let repo = db.payments();

        let created = repo.create(pending_mpesa("ws_CO_123")).await.unwrap();
        let callback = json!({ "ResultCode": 0, "MpesaReceiptNumber": "RCP1" });

        let outcome = repo
            .settle(&created.id, PaymentStatus::Completed, Some("RCP1"), &callback)
            .await
            .unwrap();
        assert_eq!(outcome, SettleOutcome::Settled);

        let fetched = repo.require(&created.id).await.unwrap();
        assert_eq!(fetched.status, PaymentStatus::Completed);
        assert_eq!(fetched.provider_transaction_id.as_deref(), Some("RCP1"));

        let raw = fetched.raw.unwrap();
        assert!(raw.get("initiated").is_some());
        assert_eq!(raw["callback"]["ResultCode"], 0);
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let db = test_db().await;
        let repo = db.payments();

        let created = repo.create(pending_mpesa("ws_CO_123")).await.unwrap();
        let callback = json!({ "ResultCode": 0 });

        repo.settle(&created.id, PaymentStatus::Completed, Some("RCP1"), &callback)
            .await
            .unwrap();

        // Redelivery with a different outcome cannot flip the status.
        let outcome = repo
            .settle(&created.id, PaymentStatus::Failed, None, &json!({ "ResultCode": 1 }))
            .await
            .unwrap();
        assert_eq!(outcome, SettleOutcome::AlreadyTerminal);

        let fetched = repo.require(&created.id).await.unwrap();
        assert_eq!(fetched.status, PaymentStatus::Completed);
        assert_eq!(fetched.provider_transaction_id.as_deref(), Some("RCP1"));
    }

    #[tokio::test]
    async fn test_settled_payment_still_matched_by_correlation_id() {
        let db = test_db().await;
        let repo = db.payments();

        let created = repo.create(pending_mpesa("ws_CO_123")).await.unwrap();
        repo.settle(&created.id, PaymentStatus::Failed, None, &json!({ "ResultCode": 1032 }))
            .await
            .unwrap();

        // A terminal payment must stay reachable through its
        // correlation id so a redelivered callback finds it instead of
        // recording a duplicate.
        let found = repo
            .find_by_checkout_request("mpesa", "ws_CO_123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, PaymentStatus::Failed);

        assert_eq!(repo.list_for_provider("mpesa").await.unwrap().len(), 1);
    }
}
