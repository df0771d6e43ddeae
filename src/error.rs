//! Typed error taxonomy for the trading core.
//!
//! Provider and upstream failures never reach a caller as an error —
//! they are mapped to `None` prices (see `aggregator`). Everything here
//! is surfaced to the (out-of-scope) transport layer, which maps each
//! variant to an HTTP status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Unable to determine price")]
    NoPrice,

    #[error("trade exceeds maximum size: {0}")]
    ExceedsMaxSize(String),

    #[error("cross-chain trading is disallowed: {0}")]
    CrossChainDisallowed(String),

    #[error("upstream price provider error: {0}")]
    UpstreamTransient(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TradeError {
    /// Whether the transport layer should surface this as a 400 (client
    /// fault) rather than a 500. `Database` is the only internal-failure
    /// variant.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, TradeError::Database(_))
    }
}

pub type TradeResult<T> = Result<T, TradeError>;
