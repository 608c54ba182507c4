//! Consensus events and votes

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use veritas_core::crypto::KeyPair;
use veritas_core::{Chaincode, ChaincodeLanguage, PublicKey, Signature, Transaction, TxHash};

/// Lifecycle of a proposed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    /// Broadcast to the validator set, no votes yet
    Proposed,
    /// At least one validator has voted
    Voted,
    /// Quorum reached; an order index was assigned and state advanced
    Committed,
    /// Terminal rejection; no order index was consumed
    Rejected,
}

/// Reason code attached to rejected events, suitable for audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Cryptographic verification failed
    InvalidSignature,
    /// Permission check failed
    Unauthorized,
    /// The command contradicted ledger state at commit time
    StateConflict,
    /// Transaction hash already seen within the retention window
    DuplicateHash,
    /// The voting window elapsed without reaching quorum
    QuorumTimeout,
    /// A weighted majority explicitly voted against
    VotedDown,
}

impl RejectReason {
    /// Map a ledger core error to its reason code
    pub fn from_error(error: &veritas_core::Error) -> Self {
        match error {
            veritas_core::Error::InvalidSignature(_) => RejectReason::InvalidSignature,
            veritas_core::Error::Unauthorized(_) => RejectReason::Unauthorized,
            veritas_core::Error::StateConflict(_) => RejectReason::StateConflict,
            veritas_core::Error::DuplicateHash(_) => RejectReason::DuplicateHash,
        }
    }
}

/// Outcome of consensus for one proposed transaction
///
/// `order` is assigned exactly once, at commit, strictly greater than all
/// previously committed orders, and never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusEvent {
    /// Round the decision was made in (None if rejected before voting)
    pub round_id: Option<Uuid>,

    /// The proposed transaction
    pub transaction: Transaction,

    /// Peer signatures endorsing the transaction
    pub endorsements: Vec<Signature>,

    /// Commit order index (None unless Committed)
    pub order: Option<u64>,

    /// Final status
    pub status: EventStatus,

    /// Reason code (None unless Rejected)
    pub reason: Option<RejectReason>,
}

/// A validator's vote on one proposed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Voting peer
    pub voter: PublicKey,

    /// Whether the voter endorses the transaction
    pub approve: bool,

    /// Signature over the transaction hash
    pub signature: Signature,
}

impl Vote {
    /// Endorse a transaction, signing its hash
    pub fn endorse(keypair: &KeyPair, hash: TxHash, timestamp_millis: i64) -> Self {
        Self::signed(keypair, hash, timestamp_millis, true)
    }

    /// Vote against a transaction, signing its hash
    pub fn dissent(keypair: &KeyPair, hash: TxHash, timestamp_millis: i64) -> Self {
        Self::signed(keypair, hash, timestamp_millis, false)
    }

    fn signed(keypair: &KeyPair, hash: TxHash, timestamp_millis: i64, approve: bool) -> Self {
        let bytes = keypair.sign(hash.as_bytes());
        Self {
            voter: keypair.public_key(),
            approve,
            signature: Signature::from_parts(keypair.public_key(), bytes, timestamp_millis),
        }
    }
}

/// Request forwarded to the external chaincode runtime
///
/// Emitted on a committed SetChaincode or Execute; this core accepts back
/// only a success/failure signal, never state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeRequest {
    /// Registered code name
    pub code_name: String,
    /// Domain the code is registered under
    pub domain_name: String,
    /// Ledger the code is registered under
    pub ledger_name: String,
    /// Language the code is written in
    pub language: ChaincodeLanguage,
    /// Raw code bytes
    pub code: Vec<u8>,
}

impl From<&Chaincode> for ChaincodeRequest {
    fn from(chaincode: &Chaincode) -> Self {
        Self {
            code_name: chaincode.code_name.clone(),
            domain_name: chaincode.domain_name.clone(),
            ledger_name: chaincode.ledger_name.clone(),
            language: chaincode.language,
            code: chaincode.code.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::Command;

    #[test]
    fn test_vote_signature_covers_transaction_hash() {
        let keypair = KeyPair::generate();
        let tx = Transaction::new(
            keypair.public_key(),
            Command::Execute { name: "x".into() },
            7,
        );

        let vote = Vote::endorse(&keypair, tx.hash, 7);
        assert!(vote.approve);
        assert!(vote.signature.verify(tx.hash.as_bytes()));

        let dissent = Vote::dissent(&keypair, tx.hash, 7);
        assert!(!dissent.approve);
        assert!(dissent.signature.verify(tx.hash.as_bytes()));
    }

    #[test]
    fn test_reject_reason_mapping() {
        let err = veritas_core::Error::Unauthorized("x".into());
        assert_eq!(RejectReason::from_error(&err), RejectReason::Unauthorized);

        let err = veritas_core::Error::StateConflict(
            veritas_core::StateConflict::NotFound("x".into()),
        );
        assert_eq!(RejectReason::from_error(&err), RejectReason::StateConflict);
    }
}
