//! # duka-checkout: Checkout Orchestration
//!
//! Turns carts and catalog listings into orders.
//!
//! ## Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  CART CHECKOUT                                                  │
//! │    owner/admin ──▶ CheckoutService::checkout()                  │
//! │      ├── get-or-create active cart                              │
//! │      ├── cart items → order lines                               │
//! │      ├── OrderRepository::create_order (tx: stock + items)      │
//! │      └── cart Active → Confirmed (best-effort)                  │
//! │                                                                 │
//! │  GUEST CHECKOUT                                                 │
//! │    guest ──▶ CheckoutService::guest_checkout()                  │
//! │      └── same, keyed by cart id + guest id, contact attached    │
//! │                                                                 │
//! │  CATALOG CHECKOUT                                               │
//! │    anyone ──▶ CheckoutService::create_catalog_order()           │
//! │      ├── catalog price frozen, no stock touched                 │
//! │      └── FulfillmentService::assign (best-effort, post-commit)  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod actor;
pub mod checkout;
pub mod error;
pub mod fulfillment;

pub use actor::{Actor, Role};
pub use checkout::{CatalogOrderRequest, CheckoutService};
pub use error::{CheckoutError, CheckoutResult};
pub use fulfillment::FulfillmentService;
