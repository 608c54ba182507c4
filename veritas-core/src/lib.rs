//! Veritas Ledger Core
//!
//! Transaction validation and state transition for a permissioned ledger.
//!
//! # Architecture
//!
//! - **Signature Verifier**: stateless Ed25519 checks over transaction hashes
//! - **Permission Resolver**: scope-matched grant lookup (Root / Domain / Asset)
//! - **State-Transition Engine**: pure `(state, command) -> state` application
//! - **Active-Set Manager**: trust-weighted validator snapshots per round
//!
//! # Invariants
//!
//! - Deterministic replay: same commands in the same order → same state
//! - All-or-nothing: a failed command never partially mutates state
//! - Narrow scope never implies wide: grants are checked at the exact scope
//!   of the object a command touches
//! - Trust is always clamped to [0, 1]

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod crypto;
pub mod error;
pub mod permissions;
pub mod state;
pub mod types;
pub mod validators;
pub mod verifier;

// Re-exports
pub use error::{Error, Result, StateConflict};
pub use state::LedgerState;
pub use types::{
    Account, AssetId, Chaincode, ChaincodeLanguage, Command, Domain, Object, Peer,
    PeerPermission, Permission, PublicKey, Signature, Transaction, TxHash,
};
pub use validators::ValidatorSet;
