//! Voting rounds
//!
//! A round is one bounded voting window. The validator set is snapshotted
//! when the round opens and frozen until it closes, so a trust change
//! committed mid-round cannot alter the quorum threshold in use.

use crate::event::Vote;
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;
use veritas_core::{PublicKey, Signature, Transaction, TxHash, ValidatorSet};

/// One proposed transaction inside a round
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The proposed transaction
    pub transaction: Transaction,

    /// Endorsing peer signatures, keyed by voter
    pub endorsements: BTreeMap<PublicKey, Signature>,

    /// Peers that voted against
    pub dissents: BTreeSet<PublicKey>,

    /// Accumulated trust weight of endorsements
    pub yes_weight: Decimal,

    /// Accumulated trust weight of dissents
    pub no_weight: Decimal,
}

impl Candidate {
    fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            endorsements: BTreeMap::new(),
            dissents: BTreeSet::new(),
            yes_weight: Decimal::ZERO,
            no_weight: Decimal::ZERO,
        }
    }

    /// Whether any validator has voted on this candidate
    pub fn has_votes(&self) -> bool {
        !self.endorsements.is_empty() || !self.dissents.is_empty()
    }
}

/// Decisions produced by closing a round
///
/// `eligible` is ordered by transaction hash: the tie-break order in which
/// conflicting quorum-eligible transactions are committed.
#[derive(Debug)]
pub struct RoundOutcome {
    /// Candidates that reached quorum, in lexicographic hash order
    pub eligible: Vec<Candidate>,

    /// Candidates a weighted majority voted against
    pub voted_down: Vec<Candidate>,

    /// Candidates still undecided when the window closed
    pub timed_out: Vec<Candidate>,
}

/// A single voting round over a frozen validator snapshot
#[derive(Debug)]
pub struct Round {
    /// Round identifier (UUIDv7 for time-ordering)
    pub id: Uuid,
    validators: ValidatorSet,
    candidates: BTreeMap<TxHash, Candidate>,
}

impl Round {
    /// Open a round over a validator snapshot
    pub fn new(validators: ValidatorSet) -> Self {
        Self {
            id: Uuid::now_v7(),
            validators,
            candidates: BTreeMap::new(),
        }
    }

    /// The frozen validator snapshot for this round
    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// Whether a transaction is already proposed in this round
    pub fn contains(&self, hash: &TxHash) -> bool {
        self.candidates.contains_key(hash)
    }

    /// Look up a candidate by transaction hash
    pub fn candidate(&self, hash: &TxHash) -> Option<&Candidate> {
        self.candidates.get(hash)
    }

    /// Number of candidates in the round
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the round has no candidates
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Add a proposed transaction to the voting window
    pub fn propose(&mut self, transaction: Transaction) {
        self.candidates
            .insert(transaction.hash, Candidate::new(transaction));
    }

    /// Record a validator's vote
    ///
    /// The voter must be in the frozen snapshot, the transaction must be in
    /// this round, and a validator votes at most once per candidate.
    pub fn record_vote(&mut self, hash: TxHash, vote: Vote) -> Result<()> {
        let weight = self
            .validators
            .weight_of(&vote.voter)
            .ok_or_else(|| Error::InvalidVote(format!("{} is not in this round's validator set", vote.voter)))?;

        let candidate = self
            .candidates
            .get_mut(&hash)
            .ok_or(Error::UnknownTransaction(hash))?;

        if candidate.endorsements.contains_key(&vote.voter)
            || candidate.dissents.contains(&vote.voter)
        {
            return Err(Error::InvalidVote(format!(
                "{} already voted on {hash}",
                vote.voter
            )));
        }

        if vote.approve {
            candidate.endorsements.insert(vote.voter, vote.signature);
            candidate.yes_weight += weight;
        } else {
            candidate.dissents.insert(vote.voter);
            candidate.no_weight += weight;
        }

        Ok(())
    }

    /// Whether a candidate has reached a terminal vote outcome
    fn is_decided(&self, candidate: &Candidate) -> bool {
        self.validators.quorum_reached(candidate.yes_weight)
            || self.validators.majority_reached(candidate.no_weight)
    }

    /// Whether every candidate is decided (the round can close early)
    pub fn all_decided(&self) -> bool {
        !self.candidates.is_empty() && self.candidates.values().all(|c| self.is_decided(c))
    }

    /// Close the round and partition candidates by outcome
    pub fn close(self) -> RoundOutcome {
        let mut eligible = Vec::new();
        let mut voted_down = Vec::new();
        let mut timed_out = Vec::new();

        // BTreeMap iteration gives lexicographic hash order
        for (_, candidate) in self.candidates {
            if self.validators.quorum_reached(candidate.yes_weight) {
                eligible.push(candidate);
            } else if self.validators.majority_reached(candidate.no_weight) {
                voted_down.push(candidate);
            } else {
                timed_out.push(candidate);
            }
        }

        RoundOutcome {
            eligible,
            voted_down,
            timed_out,
        }
    }
}
