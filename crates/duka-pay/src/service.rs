//! # Payments Service
//!
//! Initiation and reconciliation around the payment records in duka-db.
//!
//! ## Matching a callback to a payment
//! ```text
//! callback arrives
//!   ├─ (a) pending payment whose initiated_checkout_request_id matches
//!   ├─ (b) pending payment whose raw.initiated.CheckoutRequestID
//!   │      matches (rows written before the correlation columns)
//!   └─ (c) none: insert an orphan payment from the callback alone -
//!          money that moved must never be dropped on the floor
//! ```
//!
//! Settlement itself is the conditional UPDATE in
//! [`duka_db::PaymentRepository::settle`]; this service only decides
//! which row it applies to and which side effects follow.

use tracing::{debug, error, info, warn};

use crate::client::{MpesaClient, StkPushRequest};
use crate::error::PayResult;
use duka_core::callback::parse_callback;
use duka_core::{Money, Payment, PaymentStatus};
use duka_db::repository::payment::NewPayment;
use duka_db::{Database, SettleOutcome};

/// Provider tag on payment rows written by this service.
pub const PROVIDER_MPESA: &str = "mpesa";

/// Input for initiating an STK push.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    /// Payer MSISDN, any accepted local format.
    pub phone: String,
    /// Amount to collect.
    pub amount: Money,
    /// Order this payment settles, if a single order.
    pub order_id: Option<String>,
    /// Cart whose orders this payment settles, for cart-scoped flows.
    pub cart_id: Option<String>,
    pub user_id: Option<String>,
    pub hotel_id: Option<String>,
    /// Statement reference; defaults to "Duka".
    pub account_reference: Option<String>,
}

/// What the caller gets back from a successful initiation.
#[derive(Debug, Clone)]
pub struct InitiateResponse {
    /// Our pending payment row.
    pub payment_id: String,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    /// Provider response body, verbatim.
    pub provider_response: serde_json::Value,
}

/// Acknowledgement returned to the provider's webhook.
///
/// Always `ResultCode: 0` - Daraja retries on anything else, and a
/// retry of a callback we failed to process internally would not go
/// better the second time.
#[derive(Debug, Clone)]
pub struct CallbackAck {
    pub result_code: i64,
    pub result_desc: String,
    /// The payment the callback was recorded against, when known.
    pub recorded_id: Option<String>,
}

/// Payment initiation and reconciliation.
#[derive(Debug, Clone)]
pub struct PaymentsService {
    db: Database,
    client: MpesaClient,
}

impl PaymentsService {
    /// Creates a service.
    pub fn new(db: Database, client: MpesaClient) -> Self {
        PaymentsService { db, client }
    }

    /// Pushes a payment prompt to the payer's phone and records a
    /// pending payment carrying the provider's correlation ids.
    ///
    /// The network call happens first; no database transaction is held
    /// over it. A provider failure surfaces as-is and writes nothing.
    pub async fn initiate_stk_push(&self, req: InitiateRequest) -> PayResult<InitiateResponse> {
        let push = self
            .client
            .stk_push(&StkPushRequest {
                amount_units: req.amount.to_units_rounded(),
                phone: req.phone.clone(),
                account_reference: req
                    .account_reference
                    .clone()
                    .unwrap_or_else(|| "Duka".to_string()),
                transaction_desc: "Order payment".to_string(),
            })
            .await?;

        let payment = self
            .db
            .payments()
            .create(NewPayment {
                provider: PROVIDER_MPESA.to_string(),
                amount_cents: req.amount.cents(),
                status: PaymentStatus::Pending,
                raw: Some(serde_json::json!({ "initiated": push.raw })),
                order_id: req.order_id.clone(),
                user_id: req.user_id,
                hotel_id: req.hotel_id,
                cart_id: req.cart_id,
                initiated_checkout_request_id: Some(push.checkout_request_id.clone()),
                initiated_merchant_request_id: Some(push.merchant_request_id.clone()),
            })
            .await?;

        // Optimistic: the prompt is on the payer's phone, so the order
        // is now awaiting payment. Failure here never unwinds the push.
        if let Some(order_id) = &req.order_id {
            match self.db.orders().mark_pending(order_id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(order_id = %order_id, "Order was not in not_paid; left unchanged")
                }
                Err(e) => warn!(order_id = %order_id, error = %e, "Failed to mark order pending"),
            }
        }

        info!(
            payment_id = %payment.id,
            checkout_request_id = %push.checkout_request_id,
            amount_cents = req.amount.cents(),
            "STK push initiated"
        );

        Ok(InitiateResponse {
            payment_id: payment.id,
            merchant_request_id: push.merchant_request_id,
            checkout_request_id: push.checkout_request_id,
            provider_response: push.raw,
        })
    }

    /// Records a provider callback against a payment and applies order
    /// side effects exactly once.
    pub async fn record_callback(&self, payload: &serde_json::Value) -> PayResult<Payment> {
        let summary = parse_callback(payload)?;

        let matched = match summary.checkout_request_id.as_deref() {
            Some(checkout_request_id) => self.match_payment(checkout_request_id).await?,
            // No correlation id at all; nothing to match against.
            None => None,
        };

        let payment = match matched {
            Some(payment) => payment,
            None => {
                // (c) No initiation on record. Insert the orphan as
                // pending and let the shared settle path finish it.
                warn!(
                    checkout_request_id = ?summary.checkout_request_id,
                    "Callback matched no pending payment; recording orphan"
                );
                self.db
                    .payments()
                    .create(NewPayment {
                        provider: PROVIDER_MPESA.to_string(),
                        amount_cents: summary.amount_cents.unwrap_or(0),
                        status: PaymentStatus::Pending,
                        raw: None,
                        order_id: None,
                        user_id: None,
                        hotel_id: None,
                        cart_id: None,
                        initiated_checkout_request_id: summary.checkout_request_id.clone(),
                        initiated_merchant_request_id: summary.merchant_request_id.clone(),
                    })
                    .await?
            }
        };

        let terminal = if summary.is_success() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };

        // Receipt falls back to the checkout request id so a settled
        // payment carries a provider reference whenever one exists.
        let receipt = if summary.is_success() {
            summary
                .receipt
                .clone()
                .or_else(|| summary.checkout_request_id.clone())
        } else {
            None
        };

        let outcome = self
            .db
            .payments()
            .settle(&payment.id, terminal, receipt.as_deref(), payload)
            .await?;

        match outcome {
            SettleOutcome::AlreadyTerminal => {
                // Redelivery: no side effects re-run.
                debug!(payment_id = %payment.id, "Callback redelivered; payment already terminal");
            }
            SettleOutcome::Settled if summary.is_success() => {
                self.apply_success_effects(&payment).await;
                info!(
                    payment_id = %payment.id,
                    receipt = ?receipt,
                    "Payment completed"
                );
            }
            SettleOutcome::Settled => {
                info!(
                    payment_id = %payment.id,
                    result_code = summary.result_code,
                    result_desc = summary.result_desc.as_deref().unwrap_or(""),
                    "Payment failed"
                );
            }
        }

        self.db.payments().require(&payment.id).await.map_err(Into::into)
    }

    /// Webhook entrypoint: never fails.
    ///
    /// The provider is always acknowledged; anything that went wrong
    /// internally is logged and dealt with out of band.
    pub async fn handle_callback(&self, payload: &serde_json::Value) -> CallbackAck {
        match self.record_callback(payload).await {
            Ok(payment) => CallbackAck {
                result_code: 0,
                result_desc: "Accepted".to_string(),
                recorded_id: Some(payment.id),
            },
            Err(e) => {
                error!(error = %e, "Failed to record provider callback");
                CallbackAck {
                    result_code: 0,
                    result_desc: "Accepted".to_string(),
                    recorded_id: None,
                }
            }
        }
    }

    /// Matching paths (a) and (b). Both cover terminal rows too: a
    /// redelivered callback must land on the settled payment and no-op,
    /// never fall through to the orphan insert.
    async fn match_payment(&self, checkout_request_id: &str) -> PayResult<Option<Payment>> {
        // (a) Correlation id stored at initiation.
        if let Some(payment) = self
            .db
            .payments()
            .find_by_checkout_request(PROVIDER_MPESA, checkout_request_id)
            .await?
        {
            return Ok(Some(payment));
        }

        // (b) Older rows: the id only lives inside the raw payload.
        let rows = self.db.payments().list_for_provider(PROVIDER_MPESA).await?;
        Ok(rows.into_iter().find(|p| {
            p.raw
                .as_ref()
                .and_then(|raw| raw.get("initiated"))
                .and_then(|i| i.get("CheckoutRequestID"))
                .and_then(|v| v.as_str())
                == Some(checkout_request_id)
        }))
    }

    /// Order/cart side effects of a successful settlement. Best-effort:
    /// the payment is already terminal, failures here are logged.
    async fn apply_success_effects(&self, payment: &Payment) {
        if let Some(order_id) = &payment.order_id {
            match self.db.orders().mark_paid(order_id).await {
                Ok(true) => {}
                Ok(false) => warn!(order_id = %order_id, "Order already terminal at settlement"),
                Err(e) => error!(order_id = %order_id, error = %e, "Failed to mark order paid"),
            }
        } else if let Some(cart_id) = &payment.cart_id {
            match self.db.orders().mark_paid_for_cart(cart_id).await {
                Ok(count) => {
                    info!(cart_id = %cart_id, orders = count, "Cart orders settled")
                }
                Err(e) => error!(cart_id = %cart_id, error = %e, "Failed to settle cart orders"),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
