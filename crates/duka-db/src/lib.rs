//! # Duka DB - Database Layer
//!
//! SQLite persistence for the Duka commerce backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              duka-db                    │
//! │                                         │
//! │  ┌──────────┐    ┌──────────────────┐   │
//! │  │ Database │───▶│   Repositories   │   │
//! │  │  (pool)  │    │ product, cart,   │   │
//! │  └──────────┘    │ order, catalog,  │   │
//! │       │          │ fulfillment,     │   │
//! │       ▼          │ payment          │   │
//! │  ┌──────────┐    └──────────────────┘   │
//! │  │ SQLite   │                           │
//! │  │ (WAL)    │    migrations embedded    │
//! │  └──────────┘    at compile time        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Repository pattern** - One repository per aggregate, holding a
//!    pool clone. Services never write SQL.
//! 2. **Conditional writes for invariants** - Stock decrements and
//!    payment settlement are single `UPDATE ... WHERE` statements so
//!    the guard and the write cannot be separated by another writer.
//! 3. **Integer cents** - All monetary columns are INTEGER cents;
//!    [`duka_core::Money`] is the only conversion point.
//! 4. **Embedded migrations** - `sqlx::migrate!` compiles the SQL files
//!    into the binary; fresh databases are migrated on connect.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// Re-export main types for convenience
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::cart::CartRepository;
pub use repository::catalog::{CatalogRepository, NewCatalogProduct, NewCatalogSource};
pub use repository::fulfillment::{FulfillmentRepository, NewFulfillment};
pub use repository::order::{NewCatalogOrder, NewOrder, OrderRepository};
pub use repository::payment::{NewPayment, PaymentRepository, SettleOutcome};
pub use repository::product::{NewProduct, ProductRepository};
