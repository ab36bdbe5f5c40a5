//! # Payment Errors

use duka_core::callback::CallbackError;
use duka_db::DbError;
use thiserror::Error;

/// Errors raised by the payment client and services.
#[derive(Debug, Error)]
pub enum PayError {
    /// Required configuration keys are missing. Lists every missing
    /// key, not just the first.
    #[error("Missing M-Pesa configuration: {0}")]
    MissingConfig(String),

    /// The provider answered with a non-success status.
    #[error("Provider error (status {status}): {body}")]
    Provider { status: u16, body: String },

    /// The provider did not answer within the deadline. Carries 504
    /// semantics for callers mapping to response codes.
    #[error("Provider timed out: {0}")]
    Timeout(String),

    /// Network-level failure talking to the provider.
    #[error("Provider request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider's response body had an unexpected shape.
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    /// Callback payload could not be parsed.
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// Database failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Convenience type alias for Results with PayError.
pub type PayResult<T> = Result<T, PayError>;
