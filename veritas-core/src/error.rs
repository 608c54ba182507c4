//! Error types for the ledger core

use crate::types::TxHash;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger core errors
///
/// Every variant is terminal for the transaction that produced it. None of
/// them corrupt ledger state: state transitions are all-or-nothing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Cryptographic verification failed; the transaction is discarded
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// No grant at the scope the command touches
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The command contradicts current ledger state
    #[error("State conflict: {0}")]
    StateConflict(#[from] StateConflict),

    /// Transaction hash already seen within the retention window
    #[error("Duplicate transaction hash: {0}")]
    DuplicateHash(TxHash),
}

/// State conflicts raised by the state-transition engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateConflict {
    /// Target object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Target identity key is already taken
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Sender balance is below the transfer amount
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Sender balance at the time of application
        balance: Decimal,
        /// Requested transfer amount
        requested: Decimal,
    },

    /// Transfer amount must be strictly positive
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
}
