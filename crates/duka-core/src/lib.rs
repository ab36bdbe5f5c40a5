//! # duka-core: Pure Business Logic for Duka Commerce
//!
//! This crate is the **heart** of the order-taking pipeline. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Duka Commerce Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          duka-checkout              duka-pay                    │   │
//! │  │    Cart/Catalog checkout,      STK push + callback              │   │
//! │  │    fulfillment assignment      reconciliation                   │   │
//! │  └─────────────────┬───────────────────────┬───────────────────────┘   │
//! │                    │                       │                            │
//! │  ┌─────────────────▼───────────────────────▼───────────────────────┐   │
//! │  │               ★ duka-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌──────────────┐   │   │
//! │  │   │   types   │ │   money   │ │   code    │ │ fulfillment  │   │   │
//! │  │   │  Order    │ │   Money   │ │ OrderCode │ │   ranking,   │   │   │
//! │  │   │  Payment  │ │  (cents)  │ │ Generator │ │   pricing    │   │   │
//! │  │   └───────────┘ └───────────┘ └───────────┘ └──────────────┘   │   │
//! │  │   ┌───────────┐ ┌───────────┐                                  │   │
//! │  │   │ callback  │ │ validation│                                  │   │
//! │  │   │  parser   │ │   rules   │                                  │   │
//! │  │   └───────────┘ └───────────┘                                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                    │                                                    │
//! │  ┌─────────────────▼───────────────────────────────────────────────┐   │
//! │  │                    duka-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Cart, Payment, CatalogProduct, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`code`] - Short order code generation (pluggable)
//! - [`callback`] - Typed STK callback payload parsing
//! - [`fulfillment`] - Source ranking and payout math
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod callback;
pub mod code;
pub mod error;
pub mod fulfillment;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use duka_core::Money` instead of
// `use duka_core::money::Money`

pub use code::{CodeGenerator, RandomCodeGenerator};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Length of the human-readable order code.
///
/// ## Why 5 characters?
/// Short enough to read over the phone, long enough that 36^5 (~60M)
/// codes make collisions rare. Collisions are handled by retrying, so
/// a small space is acceptable.
pub const ORDER_CODE_LENGTH: usize = 5;

/// Alphabet for order codes: uppercase letters and digits.
pub const ORDER_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How many times a unique-constraint collision on the order code is
/// retried before the order is left without a code.
///
/// An order without a code is NOT an error - the code is a convenience
/// lookup key, never a primary key.
pub const ORDER_CODE_MAX_ATTEMPTS: u32 = 5;

/// Platform cut taken from a catalog sale, in basis points (500 = 5%).
///
/// Kept as a named constant (overridable via `FulfillmentPricing`)
/// rather than a load-bearing business rule baked into the math.
pub const PLATFORM_CUT_BPS: u32 = 500;

/// Flat transport fee in cents added to a fulfillment payout breakdown.
///
/// Currently always zero. The field stays in the breakdown shape so a
/// real transport calculation can slot in without a schema change.
pub const TRANSPORT_FEE_CENTS: i64 = 0;

/// Maximum quantity of a single line in an order.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
