//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for balances and trust)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Ed25519 public key identifying an account or a peer
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; 32]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

/// Transaction content hash (SHA-256 over creator + command + timestamp)
///
/// Derived `Ord` gives lexicographic byte order, which is the tie-break
/// order used when conflicting transactions commit in the same round.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TxHash(#[serde(with = "serde_bytes")] [u8; 32]);

impl TxHash {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(&self.0[..8]))
    }
}

/// Asset identity: a named asset within a domain
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssetId {
    /// Asset name, unique within its domain
    pub name: String,
    /// Domain the asset belongs to
    pub domain: String,
}

impl AssetId {
    /// Create a new asset identity
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.domain)
    }
}

/// Ledger-wide rights (domain and user lifecycle)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRights {
    /// May create domains
    pub domain_add: bool,
    /// May remove domains
    pub domain_remove: bool,
    /// May add accounts in any domain
    pub user_add: bool,
    /// May remove accounts in any domain
    pub user_remove: bool,
    /// May grant permissions and administer peers
    pub user_give_permission: bool,
}

/// Per-domain user lifecycle rights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRights {
    /// May add accounts in this domain
    pub user_add: bool,
    /// May remove accounts in this domain
    pub user_remove: bool,
    /// May grant permissions within this domain
    pub user_give_permission: bool,
}

/// Per-asset rights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRights {
    /// May transfer the asset
    pub transfer: bool,
    /// May add units of the asset
    pub add: bool,
    /// May remove units of the asset
    pub remove: bool,
    /// May create the asset
    pub create: bool,
}

/// A permission grant at one of three scopes
///
/// A grant at a narrower scope never implies a wider one; resolution always
/// checks the scope matching the target object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// Ledger-wide rights
    Root(RootRights),
    /// User lifecycle rights within one domain
    Domain {
        /// Domain the rights apply to
        domain: String,
        /// Granted rights
        rights: DomainRights,
    },
    /// Transfer/mint rights on one named asset
    Asset {
        /// Asset the rights apply to
        asset: AssetId,
        /// Granted rights
        rights: AssetRights,
    },
}

impl Permission {
    /// Domain this grant is stored under, if domain- or asset-scoped
    pub fn domain_name(&self) -> Option<&str> {
        match self {
            Permission::Root(_) => None,
            Permission::Domain { domain, .. } => Some(domain),
            Permission::Asset { asset, .. } => Some(&asset.domain),
        }
    }
}

/// Ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identity
    pub public_key: PublicKey,
    /// Human-readable alias
    pub alias: String,
    /// Domains the account is a member of
    pub domains: BTreeSet<String>,
    /// Additional signer keys (multi-signature)
    pub signatories: BTreeSet<PublicKey>,
    /// Number of signatory keys required for account-initiated transactions
    pub use_keys: u16,
}

impl Account {
    /// Create a new account with no signatories and a single-key threshold
    pub fn new(public_key: PublicKey, alias: impl Into<String>) -> Self {
        Self {
            public_key,
            alias: alias.into(),
            domains: BTreeSet::new(),
            signatories: BTreeSet::new(),
            use_keys: 1,
        }
    }

    /// Add a domain membership
    pub fn in_domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.insert(domain.into());
        self
    }
}

/// Ledger domain: a namespace for accounts, assets, and grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Name, unique within the ledger
    pub name: String,
    /// Ledger the domain belongs to
    pub ledger_id: String,
    /// Domain- and asset-scoped grants, keyed by grantee
    pub grants: BTreeMap<PublicKey, Vec<Permission>>,
}

impl Domain {
    /// Create an empty domain
    pub fn new(name: impl Into<String>, ledger_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ledger_id: ledger_id.into(),
            grants: BTreeMap::new(),
        }
    }
}

/// Network-level rights of a peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPermission {
    /// May join the peer network
    pub join_network: bool,
    /// May join the validating quorum
    pub join_validation: bool,
}

/// Validating peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    /// Unique identity
    pub public_key: PublicKey,
    /// Network address, opaque to this core
    pub address: String,
    /// Voting weight in [0, 1]
    pub trust: Decimal,
    /// Whether the peer is currently active
    pub active: bool,
    /// Network-level rights
    pub permission: PeerPermission,
}

/// Chaincode descriptor stored by SetChaincode
///
/// This core stores the descriptor only; execution happens in an external
/// runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chaincode {
    /// Code name, unique within (domain, ledger)
    pub code_name: String,
    /// Domain the code is registered under
    pub domain_name: String,
    /// Ledger the code is registered under
    pub ledger_name: String,
    /// Language the code is written in
    pub language: ChaincodeLanguage,
    /// Raw code bytes, never interpreted here
    #[serde(with = "serde_bytes")]
    pub code: Vec<u8>,
}

/// Supported chaincode languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChaincodeLanguage {
    /// Java 8
    Java8,
    /// Python 3
    Python3,
}

/// Ledger object targeted by Add/Remove
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// An account
    Account(Account),
    /// A domain
    Domain(Domain),
    /// A peer
    Peer(Peer),
    /// A permission grant
    Grant {
        /// Key the permission is granted to
        grantee: PublicKey,
        /// The granted permission
        permission: Permission,
    },
}

impl Object {
    /// Short object kind for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Account(_) => "account",
            Object::Domain(_) => "domain",
            Object::Peer(_) => "peer",
            Object::Grant { .. } => "grant",
        }
    }
}

/// Ledger command
///
/// Immutable once constructed; each variant carries its own typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Insert an object by identity key
    Add {
        /// Object to insert
        object: Object,
    },
    /// Delete an object by identity key
    Remove {
        /// Object to delete
        object: Object,
    },
    /// Move asset units between accounts
    Transfer {
        /// Asset being moved
        asset: AssetId,
        /// Debited account
        sender: PublicKey,
        /// Credited account
        receiver: PublicKey,
        /// Amount, must be strictly positive
        amount: Decimal,
    },
    /// Marker forwarded to the external chaincode runtime; no state change
    Execute {
        /// Registered code name
        name: String,
    },
    /// Set a peer's trust to an absolute value, clamped to [0, 1]
    SetPeerTrust {
        /// Target peer
        peer: PublicKey,
        /// New trust value
        trust: Decimal,
    },
    /// Adjust a peer's trust by a delta, clamped to [0, 1]
    ChangePeerTrust {
        /// Target peer
        peer: PublicKey,
        /// Trust delta, may be negative
        delta: Decimal,
    },
    /// Replace a peer's permission set
    SetPeerPermission {
        /// Target peer
        peer: PublicKey,
        /// Replacement permission set
        permission: PeerPermission,
    },
    /// Store a chaincode descriptor under (domain, ledger, code name)
    SetChaincode {
        /// Descriptor to store
        chaincode: Chaincode,
    },
    /// Add signer keys to an account; additive and idempotent
    AddSignatory {
        /// Target account
        account: PublicKey,
        /// Keys to add
        signatories: Vec<PublicKey>,
    },
    /// Set the signature threshold on a batch of accounts, all-or-nothing
    SetAccountsUseKeys {
        /// Target accounts
        accounts: Vec<PublicKey>,
        /// New threshold
        use_keys: u16,
    },
}

impl Command {
    /// Short command name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Add { .. } => "Add",
            Command::Remove { .. } => "Remove",
            Command::Transfer { .. } => "Transfer",
            Command::Execute { .. } => "Execute",
            Command::SetPeerTrust { .. } => "SetPeerTrust",
            Command::ChangePeerTrust { .. } => "ChangePeerTrust",
            Command::SetPeerPermission { .. } => "SetPeerPermission",
            Command::SetChaincode { .. } => "SetChaincode",
            Command::AddSignatory { .. } => "AddSignatory",
            Command::SetAccountsUseKeys { .. } => "SetAccountsUseKeys",
        }
    }
}

/// Digital signature (Ed25519) over a transaction hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Key the signature is claimed for
    pub public_key: PublicKey,
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
    /// Signing timestamp (milliseconds since Unix epoch)
    pub timestamp_millis: i64,
}

impl Signature {
    /// Create from parts
    pub fn from_parts(public_key: PublicKey, bytes: [u8; 64], timestamp_millis: i64) -> Self {
        Self {
            public_key,
            bytes,
            timestamp_millis,
        }
    }

    /// Get signature bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Verify against the claimed public key
    pub fn verify(&self, message: &[u8]) -> bool {
        use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};

        let signature = DalekSignature::from_bytes(&self.bytes);

        let verifying_key = match VerifyingKey::from_bytes(self.public_key.as_bytes()) {
            Ok(key) => key,
            Err(_) => return false,
        };

        verifying_key.verify(message, &signature).is_ok()
    }
}

/// Signed ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Key of the account that created the transaction
    pub creator: PublicKey,
    /// The single command carried
    pub command: Command,
    /// Contributed signatures over the content hash
    pub signatures: Vec<Signature>,
    /// Creation timestamp (milliseconds since Unix epoch)
    pub timestamp_millis: i64,
    /// Content hash over creator + command + timestamp
    pub hash: TxHash,
}

impl Transaction {
    /// Create an unsigned transaction, computing its content hash
    pub fn new(creator: PublicKey, command: Command, timestamp_millis: i64) -> Self {
        let hash = crate::crypto::hash_transaction(&creator, &command, timestamp_millis);
        Self {
            creator,
            command,
            signatures: Vec::new(),
            timestamp_millis,
            hash,
        }
    }

    /// Recompute the content hash from current fields
    pub fn recompute_hash(&self) -> TxHash {
        crate::crypto::hash_transaction(&self.creator, &self.command, self.timestamp_millis)
    }

    /// Attach a signature
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Keys that have contributed a signature
    pub fn signer_keys(&self) -> BTreeSet<PublicKey> {
        self.signatures.iter().map(|s| s.public_key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_asset_id_display() {
        let asset = AssetId::new("USD", "finance");
        assert_eq!(asset.to_string(), "USD#finance");
    }

    #[test]
    fn test_public_key_display_is_hex() {
        let key = PublicKey::from_bytes([0xab; 32]);
        assert_eq!(key.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_tx_hash_ordering_is_lexicographic() {
        let low = TxHash::from_bytes([0u8; 32]);
        let high = TxHash::from_bytes([1u8; 32]);
        assert!(low < high);
    }

    #[test]
    fn test_transaction_hash_depends_on_contents() {
        let creator = PublicKey::from_bytes([1u8; 32]);
        let now = Utc::now().timestamp_millis();

        let tx1 = Transaction::new(creator, Command::Execute { name: "a".into() }, now);
        let tx2 = Transaction::new(creator, Command::Execute { name: "b".into() }, now);
        let tx3 = Transaction::new(creator, Command::Execute { name: "a".into() }, now + 1);

        assert_ne!(tx1.hash, tx2.hash);
        assert_ne!(tx1.hash, tx3.hash);
        assert_eq!(
            tx1.hash,
            Transaction::new(creator, Command::Execute { name: "a".into() }, now).hash
        );
    }

    #[test]
    fn test_signatures_do_not_change_hash() {
        let creator = PublicKey::from_bytes([1u8; 32]);
        let tx = Transaction::new(creator, Command::Execute { name: "a".into() }, 42);
        let hash = tx.hash;

        let signed = tx.with_signature(Signature::from_parts(creator, [0u8; 64], 42));
        assert_eq!(signed.recompute_hash(), hash);
    }

    #[test]
    fn test_account_builder() {
        let account = Account::new(PublicKey::from_bytes([2u8; 32]), "alice").in_domain("finance");
        assert_eq!(account.alias, "alice");
        assert!(account.domains.contains("finance"));
        assert_eq!(account.use_keys, 1);
    }

    #[test]
    fn test_permission_domain_name() {
        let root = Permission::Root(RootRights::default());
        assert_eq!(root.domain_name(), None);

        let asset = Permission::Asset {
            asset: AssetId::new("USD", "finance"),
            rights: AssetRights::default(),
        };
        assert_eq!(asset.domain_name(), Some("finance"));
    }
}
