//! Error types for the decomposition routines.
//!
//! Public entry points return `anyhow::Result`, the errors they raise are
//! `LinalgError` values and can be recovered with `downcast_ref`.

use thiserror::Error;

/// Errors raised by `svd_fast`, `cca` and their helpers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    /// Malformed dimensions or out-of-range parameters, detected before any work is done.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A decomposition did not converge or produced non-finite / non-orthonormal factors.
    #[error("Numerical failure: {0}")]
    NumericalFailure(String),
}

impl LinalgError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::NumericalFailure(msg.into())
    }
}
