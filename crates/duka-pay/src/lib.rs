//! # duka-pay: M-Pesa Payment Initiation and Reconciliation
//!
//! ## Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  INITIATE                                                        │
//! │    caller ──▶ PaymentsService::initiate_stk_push()               │
//! │      ├── MpesaClient: OAuth token (retried), then STK push       │
//! │      │     (network first - no DB transaction held over I/O)     │
//! │      ├── persist pending payment + correlation ids + raw payload │
//! │      └── optional order: not_paid → pending                      │
//! │                                                                  │
//! │  RECONCILE (provider calls back, possibly more than once)        │
//! │    webhook ──▶ PaymentsService::handle_callback()                │
//! │      ├── parse typed callback (duka-core::callback)              │
//! │      ├── match: correlation id → raw scan → orphan insert        │
//! │      ├── settle: one conditional UPDATE out of 'pending'         │
//! │      ├── success: order paid / cart's orders paid                │
//! │      └── always acknowledge (ResultCode: 0), errors logged       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod phone;
pub mod service;

pub use client::{MpesaClient, StkPushRequest, StkPushResponse};
pub use config::MpesaConfig;
pub use error::{PayError, PayResult};
pub use service::{CallbackAck, InitiateRequest, InitiateResponse, PaymentsService};
