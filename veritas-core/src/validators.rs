//! Peer trust and active-set management
//!
//! The validating quorum is recomputed once per consensus round and frozen
//! for that round: a trust change committed mid-round never retroactively
//! alters the quorum threshold already in use.

use crate::state::LedgerState;
use crate::types::PublicKey;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Frozen snapshot of the validating peers and their trust weights
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorSet {
    validators: BTreeMap<PublicKey, Decimal>,
    total_weight: Decimal,
}

impl ValidatorSet {
    /// Snapshot the active validators from a state
    ///
    /// A peer validates when it is active, holds the joinValidation right,
    /// and carries strictly positive trust.
    pub fn snapshot(state: &LedgerState) -> Self {
        let validators: BTreeMap<PublicKey, Decimal> = state
            .peers
            .values()
            .filter(|p| p.active && p.permission.join_validation && p.trust > Decimal::ZERO)
            .map(|p| (p.public_key, p.trust))
            .collect();
        let total_weight = validators.values().copied().sum();

        Self {
            validators,
            total_weight,
        }
    }

    /// Trust weight of a validator, if it is in the set
    pub fn weight_of(&self, key: &PublicKey) -> Option<Decimal> {
        self.validators.get(key).copied()
    }

    /// Sum of all trust weights in the set
    pub fn total_weight(&self) -> Decimal {
        self.total_weight
    }

    /// Number of validators in the set
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty (no quorum can ever form)
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Iterate validators in key order
    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, &Decimal)> {
        self.validators.iter()
    }

    /// Supermajority check: strictly greater than two thirds of total weight
    ///
    /// Exact decimal arithmetic; a weight of exactly 2/3 never commits.
    pub fn quorum_reached(&self, weight: Decimal) -> bool {
        weight * Decimal::from(3) > self.total_weight * Decimal::from(2)
    }

    /// Majority check used for explicit rejection: strictly greater than half
    pub fn majority_reached(&self, weight: Decimal) -> bool {
        weight * Decimal::from(2) > self.total_weight
    }
}
