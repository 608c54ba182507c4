//! Identity and signature verification
//!
//! Stateless cryptographic checks run before a transaction enters the
//! ordering pipeline and again by every voting validator.

use crate::types::Transaction;
use crate::{Error, Result};
use tracing::debug;

/// Verify a transaction's content hash and every declared signature
///
/// Fails if the stored hash does not match recomputation (tampering), if the
/// signature list is empty, or if any signature does not verify against its
/// claimed public key. Side-effect-free.
pub fn verify(transaction: &Transaction) -> Result<()> {
    if transaction.recompute_hash() != transaction.hash {
        return Err(Error::InvalidSignature(format!(
            "content hash mismatch for {}",
            transaction.hash
        )));
    }

    if transaction.signatures.is_empty() {
        return Err(Error::InvalidSignature(format!(
            "transaction {} carries no signatures",
            transaction.hash
        )));
    }

    for signature in &transaction.signatures {
        if !signature.verify(transaction.hash.as_bytes()) {
            debug!(hash = %transaction.hash, key = %signature.public_key, "signature rejected");
            return Err(Error::InvalidSignature(format!(
                "signature by {} does not verify for {}",
                signature.public_key, transaction.hash
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::{Command, Signature, Transaction};

    fn signed_execute(keypair: &KeyPair) -> Transaction {
        let tx = Transaction::new(
            keypair.public_key(),
            Command::Execute { name: "code".into() },
            1_700_000_000_000,
        );
        let signature = keypair.sign_transaction(&tx, 1_700_000_000_000);
        tx.with_signature(signature)
    }

    #[test]
    fn test_valid_transaction_passes() {
        let keypair = KeyPair::generate();
        let tx = signed_execute(&keypair);
        assert!(verify(&tx).is_ok());
    }

    #[test]
    fn test_empty_signature_list_fails() {
        let keypair = KeyPair::generate();
        let tx = Transaction::new(
            keypair.public_key(),
            Command::Execute { name: "code".into() },
            1,
        );
        assert!(matches!(verify(&tx), Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_tampered_command_fails() {
        let keypair = KeyPair::generate();
        let mut tx = signed_execute(&keypair);

        // Mutating the command invalidates the stored hash
        tx.command = Command::Execute { name: "other".into() };
        assert!(matches!(verify(&tx), Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_forged_signature_fails() {
        let keypair = KeyPair::generate();
        let forger = KeyPair::generate();

        let tx = Transaction::new(
            keypair.public_key(),
            Command::Execute { name: "code".into() },
            1,
        );
        let genuine = keypair.sign_transaction(&tx, 1);

        // Claim the signature came from a different key
        let forged = Signature::from_parts(forger.public_key(), *genuine.as_bytes(), 1);
        let tx = tx.with_signature(forged);
        assert!(matches!(verify(&tx), Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_any_bad_signature_fails_the_whole_transaction() {
        let keypair = KeyPair::generate();
        let tx = signed_execute(&keypair);
        let bad = Signature::from_parts(KeyPair::generate().public_key(), [7u8; 64], 1);
        let tx = tx.with_signature(bad);
        assert!(verify(&tx).is_err());
    }
}
