//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pair generation, signing, and verification
//! - SHA-256 content hashing for transactions
//! - Deterministic key derivation from seeds for reproducibility

use crate::types::{Command, PublicKey, Signature, Transaction, TxHash};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.verifying_key.to_bytes())
    }

    /// Sign a message, returning raw signature bytes
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign a transaction's content hash
    pub fn sign_transaction(&self, transaction: &Transaction, timestamp_millis: i64) -> Signature {
        let bytes = self.sign(transaction.hash.as_bytes());
        Signature::from_parts(self.public_key(), bytes, timestamp_millis)
    }
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute a transaction content hash
///
/// The hash covers creator, command, and creation timestamp; signatures are
/// excluded so signing does not change the hash they sign.
pub fn hash_transaction(creator: &PublicKey, command: &Command, timestamp_millis: i64) -> TxHash {
    // Deterministic serialization for hashing
    let bytes = bincode::serialize(&(creator, command, timestamp_millis))
        .expect("serialization cannot fail");
    TxHash::from_bytes(hash_bytes(&bytes))
}
