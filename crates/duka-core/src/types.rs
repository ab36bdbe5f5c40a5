//! # Domain Types
//!
//! Core domain types for the order-taking pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Cart        │   │     Order       │   │    Payment      │       │
//! │  │  ─────────────  │──►│  ─────────────  │──►│  ─────────────  │       │
//! │  │  owner_id       │   │  code (5-char)  │   │  provider       │       │
//! │  │  status         │   │  status         │   │  status         │       │
//! │  │  CartItem[]     │   │  total_cents    │   │  correlation id │       │
//! │  └─────────────────┘   │  OrderItem[]    │   └─────────────────┘       │
//! │                        └────────┬────────┘                              │
//! │  ┌─────────────────┐            │         ┌──────────────────────┐     │
//! │  │ CatalogProduct  │────────────┴────────►│  OrderFulfillment    │     │
//! │  │ + Source[]      │  (catalog orders)    │  chosen hotel/product│     │
//! │  └─────────────────┘                      │  + PriceBreakdown    │     │
//! │                                           └──────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Orders have two identifiers:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `code`: 5-char human code - nullable, assigned best-effort after creation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle of a cart.
///
/// Exactly one `Active` cart exists per owner at a time (get-or-create
/// semantics). A cart leaves `Active` only after an order was
/// successfully created from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Confirmed,
    Completed,
}

impl Default for CartStatus {
    fn default() -> Self {
        CartStatus::Active
    }
}

/// The status of an order.
///
/// `status` is the only order field mutated after creation: payment
/// events move it `NotPaid → Pending → Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting payment initiation.
    NotPaid,
    /// A payment has been initiated but not yet settled.
    Pending,
    /// Settled by a successful provider callback.
    Paid,
    /// Canceled by an operator.
    Canceled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::NotPaid
    }
}

/// Where an order originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    /// Authenticated web-shop checkout.
    Ecom,
    /// In-person point-of-sale checkout.
    Pos,
    /// Guest purchase of a marketplace catalog product.
    Catalog,
}

/// State machine per payment: `Pending → Completed` | `Pending → Failed`.
/// Terminal states are never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

/// Status of a fulfillment assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Assigned,
}

/// Whether the sourcing hotel has been paid out for a fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Unpaid,
    Paid,
}

// =============================================================================
// Product
// =============================================================================

/// A hotel-scoped product with authoritative inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning hotel, when the product belongs to one.
    pub hotel_id: Option<String>,

    /// Display name.
    pub name: String,

    /// Unit price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Current stock level. Invariant: never negative - the order
    /// transaction decrements it with a conditional guard.
    pub stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A shopping cart. Owned by a user or a guest id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    /// User or guest id that owns the cart.
    pub owner_id: String,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    /// Quantity requested, always >= 1.
    pub quantity: i64,
    /// Presentational only - never drives control flow.
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// One requested line of an order: what the caller asks for, before
/// any product lookup or stock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Guest identity attached to an order at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A persisted order.
///
/// Created exactly once per checkout. After creation only `status`,
/// `code` (best-effort), `contact` (guest flows) and `fulfillment_id`
/// (best-effort stamp) are ever written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Short human-readable code, `[A-Z0-9]{5}`. Nullable: a code
    /// assignment that keeps colliding is abandoned, not fatal.
    pub code: Option<String>,
    pub status: OrderStatus,
    /// Total in cents: Σ unit_price × quantity over all items.
    pub total_cents: i64,
    pub source: OrderSource,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    /// Cart this order was checked out from, for traceability and
    /// cart-scoped settlement.
    pub cart_id: Option<String>,
    /// Set only for `Catalog` orders.
    pub catalog_product_id: Option<String>,
    pub contact: Option<Contact>,
    pub fulfillment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item of a persisted order. Immutable after creation.
///
/// Exists only for `ecom`/`pos` orders with per-item inventory -
/// catalog orders carry no items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen snapshot - the
    /// product's price may change later).
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// An order together with its eagerly loaded items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A marketplace catalog product.
///
/// Read-only from the checkout pipeline's perspective: `stock` here is
/// advisory, the per-source inventory is authoritative, so catalog
/// checkout deliberately does not decrement it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    /// URL-friendly unique slug.
    pub slug: String,
    pub description: Option<String>,
    pub initial_price_cents: Option<i64>,
    pub final_price_cents: Option<i64>,
    pub stock: i64,
    pub is_visible: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogProduct {
    /// Effective unit price: final price if set, else initial price,
    /// else zero.
    pub fn unit_price_cents(&self) -> i64 {
        self.final_price_cents
            .or(self.initial_price_cents)
            .unwrap_or(0)
    }
}

/// One physical fulfillment option for a catalog product: a hotel and/or
/// a local product that can satisfy it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogProductSource {
    pub id: String,
    pub catalog_product_id: String,
    pub hotel_id: Option<String>,
    pub product_id: Option<String>,
    /// What the hotel charges the platform, in cents.
    pub base_price_cents: Option<i64>,
    pub enabled: bool,
    /// Lower is preferred.
    pub priority: i64,
    /// Opaque constraints blob (delivery windows etc.), JSON text.
    pub constraints: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Fulfillment
// =============================================================================

/// Payout math for one fulfillment, all in cents.
///
/// Serialized with camelCase keys to match the stored JSON shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// What the buyer paid per the catalog listing.
    pub catalog_price_cents: i64,
    /// What the sourcing hotel charges.
    pub hotel_base: i64,
    /// Transport fee. Always present in the shape, currently 0.
    pub transport: i64,
    /// Platform's cut of the catalog price.
    pub platform_cut: i64,
    /// catalog − (base + transport + cut). May be negative.
    pub profit: i64,
}

/// The assignment of a concrete hotel/product pair to an order.
/// One fulfillment per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFulfillment {
    pub id: String,
    pub order_id: String,
    pub assigned_hotel_id: Option<String>,
    pub assigned_product_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub status: FulfillmentStatus,
    pub price_breakdown: PriceBreakdown,
    pub payout_status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment record.
///
/// Created at initiation time as `Pending` with the provider's
/// correlation ids, then moved exactly once to a terminal status by the
/// reconciler. `raw` accumulates provider payloads (`initiated`, then
/// `callback`) for audit and the fallback matching path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    /// Provider name, e.g. "mpesa" or "cash".
    pub provider: String,
    /// Provider receipt, set when the payment settles.
    pub provider_transaction_id: Option<String>,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    /// Opaque provider payloads keyed by phase.
    pub raw: Option<serde_json::Value>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub hotel_id: Option<String>,
    pub cart_id: Option<String>,
    /// Provider `CheckoutRequestID` captured at initiation.
    pub initiated_checkout_request_id: Option<String>,
    /// Provider `MerchantRequestID` captured at initiation.
    pub initiated_merchant_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_price_fallback_chain() {
        let mut p = CatalogProduct {
            id: "c1".into(),
            name: "Towel Set".into(),
            slug: "towel-set".into(),
            description: None,
            initial_price_cents: Some(1000),
            final_price_cents: Some(1200),
            stock: 5,
            is_visible: true,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(p.unit_price_cents(), 1200);

        p.final_price_cents = None;
        assert_eq!(p.unit_price_cents(), 1000);

        p.initial_price_cents = None;
        assert_eq!(p.unit_price_cents(), 0);
    }

    #[test]
    fn test_payment_status_terminality() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_price_breakdown_json_shape() {
        let b = PriceBreakdown {
            catalog_price_cents: 1200,
            hotel_base: 800,
            transport: 0,
            platform_cut: 60,
            profit: 340,
        };
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["catalogPriceCents"], 1200);
        assert_eq!(json["hotelBase"], 800);
        assert_eq!(json["platformCut"], 60);
    }

    #[test]
    fn test_order_status_serde() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::NotPaid).unwrap(),
            "\"not_paid\""
        );
    }
}
