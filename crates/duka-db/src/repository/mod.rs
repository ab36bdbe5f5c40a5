//! # Repository Layer
//!
//! Data access for the commerce aggregates.
//!
//! ## Pattern
//! Each repository:
//! - Holds a clone of the connection pool (cheap - it's an Arc internally)
//! - Provides typed async methods for queries
//! - Returns `DbResult<T>` for error handling
//! - Maps database rows to `duka_core` domain types
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(config).await?;
//! let products = db.products();
//! let product = products.get_by_id("some-id").await?;
//! ```
//!
//! ## Multi-statement invariants
//! Operations that must hold an invariant across several statements
//! (order creation with stock decrement, cart checkout, payment
//! settlement) run inside a single transaction on one connection,
//! with the guard expressed in the `WHERE` clause of the write.

pub mod cart;
pub mod catalog;
pub mod fulfillment;
pub mod order;
pub mod payment;
pub mod product;
