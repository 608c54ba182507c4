//! Veritas Consensus Ordering Service
//!
//! Orders concurrently-proposed transactions into a single committed
//! sequence using trust-weighted peer voting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Peers / Clients                   │
//! │        submit transactions, cast weighted votes      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ OrderingHandle (Clone)
//!                      ↓
//! ┌─────────────────────────────────────────────────────┐
//! │           OrderingService (single task)              │
//! │  verify → authorize → round voting → quorum > 2/3   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ commit (serialized)
//!                      ↓
//! ┌─────────────────────────────────────────────────────┐
//! │                  Veritas Ledger Core                 │
//! │        pure state transitions, frozen quorums        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - Safety: commit requires strictly more than 2/3 of the frozen active
//!   trust-weight; conflicting transactions resolve by hash order
//! - Order: committed order indices are strictly increasing and never
//!   reused, even across rejected interleavings
//! - Liveness: rounds time out and reject instead of blocking; submission
//!   never blocks on an in-flight round

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod round;
pub mod service;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use event::{ChaincodeRequest, ConsensusEvent, EventStatus, RejectReason, Vote};
pub use round::Round;
pub use service::{spawn_ordering_service, OrderingHandle, OrderingService};
