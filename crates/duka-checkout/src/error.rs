//! # Checkout Errors

use duka_core::CoreError;
use duka_db::DbError;
use thiserror::Error;

/// Errors raised by the checkout and fulfillment services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Domain rule violation raised before any write.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Database failure (also carries domain errors raised inside the
    /// order transaction, e.g. InsufficientStock).
    #[error(transparent)]
    Db(#[from] DbError),
}

impl CheckoutError {
    /// Flattens the two wrapping layers to the domain error, if this is
    /// one. Callers mapping to response codes only care about the
    /// domain taxonomy, not which layer raised it.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            CheckoutError::Domain(e) => Some(e),
            CheckoutError::Db(DbError::Domain(e)) => Some(e),
            CheckoutError::Db(_) => None,
        }
    }
}

/// Convenience type alias for Results with CheckoutError.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
