//! Error types for consensus

use thiserror::Error;
use veritas_core::TxHash;

/// Result type for consensus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Consensus errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger core error (signature, authorization, state conflict)
    #[error("Ledger error: {0}")]
    Ledger(#[from] veritas_core::Error),

    /// Vote failed validation (unknown voter, bad signature, double vote)
    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    /// Vote references a transaction not in the current round
    #[error("No transaction {0} in the current round")]
    UnknownTransaction(TxHash),

    /// Vote arrived while no round was open
    #[error("No active round")]
    NoActiveRound,

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
