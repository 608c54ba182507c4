//! Ledger state and the state-transition engine
//!
//! `LedgerState` is a pure snapshot of all accounts, domains, peers, grants,
//! and balances at a given committed order. `apply` is a pure function: it
//! never mutates the input snapshot, so a failed command leaves no trace.

use crate::error::{Result, StateConflict};
use crate::types::{
    Account, AssetId, Chaincode, Command, Domain, Object, Peer, Permission, PublicKey, RootRights,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Clamp a trust value into [0, 1]
///
/// Explicit policy for SetPeerTrust/ChangePeerTrust: out-of-range input is
/// clamped, never an error.
pub fn clamp_trust(trust: Decimal) -> Decimal {
    trust.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Aggregate ledger state at a committed order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Accounts keyed by public key
    pub accounts: BTreeMap<PublicKey, Account>,

    /// Domains keyed by name
    pub domains: BTreeMap<String, Domain>,

    /// Peers keyed by public key
    pub peers: BTreeMap<PublicKey, Peer>,

    /// Ledger-wide grants keyed by grantee
    pub root_grants: BTreeMap<PublicKey, RootRights>,

    /// Asset balances per account
    pub balances: BTreeMap<PublicKey, BTreeMap<AssetId, Decimal>>,

    /// Chaincode descriptors keyed by (domain, ledger, code name)
    pub chaincodes: BTreeMap<(String, String, String), Chaincode>,

    /// Order of the last committed transaction (0 at genesis)
    pub committed_order: u64,
}

impl LedgerState {
    /// Create an empty genesis state
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an account in an asset (zero if absent)
    pub fn balance(&self, account: &PublicKey, asset: &AssetId) -> Decimal {
        self.balances
            .get(account)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Credit an account, used when seeding genesis balances
    pub fn credit(&mut self, account: PublicKey, asset: AssetId, amount: Decimal) {
        *self
            .balances
            .entry(account)
            .or_default()
            .entry(asset)
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Look up a stored chaincode descriptor by code name
    pub fn find_chaincode(&self, name: &str) -> Option<&Chaincode> {
        self.chaincodes
            .values()
            .find(|cc| cc.code_name == name)
    }

    /// Apply a command, producing the successor state
    ///
    /// Pure and deterministic. Preconditions on authorization are the
    /// permission resolver's job; this engine checks state conflicts only.
    pub fn apply(&self, command: &Command) -> Result<LedgerState> {
        let mut next = self.clone();

        match command {
            Command::Add { object } => next.add_object(object)?,
            Command::Remove { object } => next.remove_object(object)?,

            Command::Transfer {
                asset,
                sender,
                receiver,
                amount,
            } => next.transfer(asset, sender, receiver, *amount)?,

            // Forwarded to the external chaincode runtime; no state change here
            Command::Execute { .. } => {}

            Command::SetPeerTrust { peer, trust } => {
                let peer = next.peer_mut(peer)?;
                peer.trust = clamp_trust(*trust);
            }

            Command::ChangePeerTrust { peer, delta } => {
                let peer = next.peer_mut(peer)?;
                peer.trust = clamp_trust(peer.trust + *delta);
            }

            Command::SetPeerPermission { peer, permission } => {
                let peer = next.peer_mut(peer)?;
                peer.permission = *permission;
            }

            Command::SetChaincode { chaincode } => {
                if !next.domains.contains_key(&chaincode.domain_name) {
                    return Err(StateConflict::NotFound(format!(
                        "domain {}",
                        chaincode.domain_name
                    ))
                    .into());
                }
                let key = (
                    chaincode.domain_name.clone(),
                    chaincode.ledger_name.clone(),
                    chaincode.code_name.clone(),
                );
                next.chaincodes.insert(key, chaincode.clone());
            }

            Command::AddSignatory {
                account,
                signatories,
            } => {
                let account = next
                    .accounts
                    .get_mut(account)
                    .ok_or_else(|| StateConflict::NotFound(format!("account {account}")))?;
                // Additive and idempotent: re-adding a signatory is a no-op
                for key in signatories {
                    account.signatories.insert(*key);
                }
            }

            Command::SetAccountsUseKeys { accounts, use_keys } => {
                // All-or-nothing: verify every target before mutating any
                for key in accounts {
                    if !next.accounts.contains_key(key) {
                        return Err(StateConflict::NotFound(format!("account {key}")).into());
                    }
                }
                for key in accounts {
                    if let Some(account) = next.accounts.get_mut(key) {
                        account.use_keys = *use_keys;
                    }
                }
            }
        }

        Ok(next)
    }

    fn peer_mut(&mut self, key: &PublicKey) -> Result<&mut Peer> {
        self.peers
            .get_mut(key)
            .ok_or_else(|| StateConflict::NotFound(format!("peer {key}")).into())
    }

    fn add_object(&mut self, object: &Object) -> Result<()> {
        match object {
            Object::Account(account) => {
                for domain in &account.domains {
                    if !self.domains.contains_key(domain) {
                        return Err(StateConflict::NotFound(format!("domain {domain}")).into());
                    }
                }
                if self.accounts.contains_key(&account.public_key) {
                    return Err(StateConflict::AlreadyExists(format!(
                        "account {}",
                        account.public_key
                    ))
                    .into());
                }
                self.accounts.insert(account.public_key, account.clone());
            }

            Object::Domain(domain) => {
                if self.domains.contains_key(&domain.name) {
                    return Err(
                        StateConflict::AlreadyExists(format!("domain {}", domain.name)).into(),
                    );
                }
                self.domains.insert(domain.name.clone(), domain.clone());
            }

            Object::Peer(peer) => {
                if self.peers.contains_key(&peer.public_key) {
                    return Err(
                        StateConflict::AlreadyExists(format!("peer {}", peer.public_key)).into(),
                    );
                }
                let mut peer = peer.clone();
                peer.trust = clamp_trust(peer.trust);
                self.peers.insert(peer.public_key, peer);
            }

            Object::Grant {
                grantee,
                permission,
            } => match permission {
                Permission::Root(rights) => {
                    if self.root_grants.contains_key(grantee) {
                        return Err(StateConflict::AlreadyExists(format!(
                            "root grant for {grantee}"
                        ))
                        .into());
                    }
                    self.root_grants.insert(*grantee, *rights);
                }
                Permission::Domain { domain, .. } | Permission::Asset {
                    asset: AssetId { domain, .. },
                    ..
                } => {
                    let domain_entry = self
                        .domains
                        .get_mut(domain)
                        .ok_or_else(|| StateConflict::NotFound(format!("domain {domain}")))?;
                    let grants = domain_entry.grants.entry(*grantee).or_default();
                    if grants.contains(permission) {
                        return Err(StateConflict::AlreadyExists(format!(
                            "grant for {grantee} in {domain}"
                        ))
                        .into());
                    }
                    grants.push(permission.clone());
                }
            },
        }

        Ok(())
    }

    fn remove_object(&mut self, object: &Object) -> Result<()> {
        match object {
            Object::Account(account) => {
                if self.accounts.remove(&account.public_key).is_none() {
                    return Err(StateConflict::NotFound(format!(
                        "account {}",
                        account.public_key
                    ))
                    .into());
                }
                self.balances.remove(&account.public_key);
            }

            Object::Domain(domain) => {
                if self.domains.remove(&domain.name).is_none() {
                    return Err(StateConflict::NotFound(format!("domain {}", domain.name)).into());
                }
                for account in self.accounts.values_mut() {
                    account.domains.remove(&domain.name);
                }
            }

            Object::Peer(peer) => {
                if self.peers.remove(&peer.public_key).is_none() {
                    return Err(
                        StateConflict::NotFound(format!("peer {}", peer.public_key)).into()
                    );
                }
            }

            Object::Grant {
                grantee,
                permission,
            } => match permission {
                Permission::Root(_) => {
                    if self.root_grants.remove(grantee).is_none() {
                        return Err(
                            StateConflict::NotFound(format!("root grant for {grantee}")).into()
                        );
                    }
                }
                Permission::Domain { domain, .. } | Permission::Asset {
                    asset: AssetId { domain, .. },
                    ..
                } => {
                    let domain_entry = self
                        .domains
                        .get_mut(domain)
                        .ok_or_else(|| StateConflict::NotFound(format!("domain {domain}")))?;
                    let grants = domain_entry.grants.get_mut(grantee).ok_or_else(|| {
                        StateConflict::NotFound(format!("grant for {grantee} in {domain}"))
                    })?;
                    let position = grants.iter().position(|p| p == permission).ok_or_else(|| {
                        StateConflict::NotFound(format!("grant for {grantee} in {domain}"))
                    })?;
                    grants.remove(position);
                    if grants.is_empty() {
                        domain_entry.grants.remove(grantee);
                    }
                }
            },
        }

        Ok(())
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        sender: &PublicKey,
        receiver: &PublicKey,
        amount: Decimal,
    ) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(StateConflict::InvalidAmount(amount).into());
        }
        if !self.accounts.contains_key(sender) {
            return Err(StateConflict::NotFound(format!("account {sender}")).into());
        }
        if !self.accounts.contains_key(receiver) {
            return Err(StateConflict::NotFound(format!("account {receiver}")).into());
        }

        let balance = self.balance(sender, asset);
        if balance < amount {
            return Err(StateConflict::InsufficientFunds {
                balance,
                requested: amount,
            }
            .into());
        }

        *self
            .balances
            .entry(*sender)
            .or_default()
            .entry(asset.clone())
            .or_insert(Decimal::ZERO) -= amount;
        self.credit(*receiver, asset.clone(), amount);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{AssetRights, ChaincodeLanguage, PeerPermission};

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes([byte; 32])
    }

    fn base_state() -> LedgerState {
        let mut state = LedgerState::new();
        state
            .domains
            .insert("finance".into(), Domain::new("finance", "ledger-1"));
        state.accounts.insert(
            key(1),
            Account::new(key(1), "alice").in_domain("finance"),
        );
        state
            .accounts
            .insert(key(2), Account::new(key(2), "bob").in_domain("finance"));
        state.peers.insert(
            key(9),
            Peer {
                public_key: key(9),
                address: "10.0.0.9:50051".into(),
                trust: Decimal::new(5, 1),
                active: true,
                permission: PeerPermission {
                    join_network: true,
                    join_validation: true,
                },
            },
        );
        state
    }

    #[test]
    fn test_add_existing_account_fails() {
        let state = base_state();
        let command = Command::Add {
            object: Object::Account(Account::new(key(1), "dup")),
        };
        let err = state.apply(&command).unwrap_err();
        assert!(matches!(
            err,
            Error::StateConflict(StateConflict::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_add_account_into_unknown_domain_fails() {
        let state = base_state();
        let command = Command::Add {
            object: Object::Account(Account::new(key(3), "carol").in_domain("ghost")),
        };
        assert!(matches!(
            state.apply(&command).unwrap_err(),
            Error::StateConflict(StateConflict::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_missing_domain_fails() {
        let state = base_state();
        let command = Command::Remove {
            object: Object::Domain(Domain::new("ghost", "ledger-1")),
        };
        assert!(matches!(
            state.apply(&command).unwrap_err(),
            Error::StateConflict(StateConflict::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_domain_strips_memberships() {
        let state = base_state();
        let command = Command::Remove {
            object: Object::Domain(Domain::new("finance", "ledger-1")),
        };
        let next = state.apply(&command).unwrap();
        assert!(!next.accounts[&key(1)].domains.contains("finance"));
    }

    #[test]
    fn test_grant_add_and_remove_roundtrip() {
        let state = base_state();
        let permission = Permission::Asset {
            asset: AssetId::new("USD", "finance"),
            rights: AssetRights {
                transfer: true,
                ..Default::default()
            },
        };
        let grant = Object::Grant {
            grantee: key(1),
            permission: permission.clone(),
        };

        let granted = state.apply(&Command::Add { object: grant.clone() }).unwrap();
        assert!(granted.domains["finance"].grants[&key(1)].contains(&permission));

        // Re-adding the identical grant conflicts
        assert!(matches!(
            granted.apply(&Command::Add { object: grant.clone() }).unwrap_err(),
            Error::StateConflict(StateConflict::AlreadyExists(_))
        ));

        let revoked = granted.apply(&Command::Remove { object: grant.clone() }).unwrap();
        assert!(!revoked.domains["finance"].grants.contains_key(&key(1)));

        // Removing again is NotFound
        assert!(matches!(
            revoked.apply(&Command::Remove { object: grant }).unwrap_err(),
            Error::StateConflict(StateConflict::NotFound(_))
        ));
    }

    #[test]
    fn test_transfer_moves_exact_amount() {
        let mut state = base_state();
        let usd = AssetId::new("USD", "finance");
        state.credit(key(1), usd.clone(), Decimal::from(100));

        let command = Command::Transfer {
            asset: usd.clone(),
            sender: key(1),
            receiver: key(2),
            amount: Decimal::from(50),
        };
        let next = state.apply(&command).unwrap();

        assert_eq!(next.balance(&key(1), &usd), Decimal::from(50));
        assert_eq!(next.balance(&key(2), &usd), Decimal::from(50));
    }

    #[test]
    fn test_transfer_insufficient_funds_is_atomic() {
        let mut state = base_state();
        let usd = AssetId::new("USD", "finance");
        state.credit(key(1), usd.clone(), Decimal::from(10));

        let command = Command::Transfer {
            asset: usd.clone(),
            sender: key(1),
            receiver: key(2),
            amount: Decimal::from(11),
        };
        let err = state.apply(&command).unwrap_err();
        assert!(matches!(
            err,
            Error::StateConflict(StateConflict::InsufficientFunds { .. })
        ));

        // Input snapshot untouched
        assert_eq!(state.balance(&key(1), &usd), Decimal::from(10));
        assert_eq!(state.balance(&key(2), &usd), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_rejects_non_positive_amount() {
        let state = base_state();
        let command = Command::Transfer {
            asset: AssetId::new("USD", "finance"),
            sender: key(1),
            receiver: key(2),
            amount: Decimal::ZERO,
        };
        assert!(matches!(
            state.apply(&command).unwrap_err(),
            Error::StateConflict(StateConflict::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_set_peer_trust_clamps() {
        let state = base_state();

        let next = state
            .apply(&Command::SetPeerTrust {
                peer: key(9),
                trust: Decimal::from(7),
            })
            .unwrap();
        assert_eq!(next.peers[&key(9)].trust, Decimal::ONE);

        let next = state
            .apply(&Command::SetPeerTrust {
                peer: key(9),
                trust: Decimal::from(-3),
            })
            .unwrap();
        assert_eq!(next.peers[&key(9)].trust, Decimal::ZERO);
    }

    #[test]
    fn test_change_peer_trust_clamps_and_never_fails_on_range() {
        let mut state = base_state();
        for _ in 0..5 {
            state = state
                .apply(&Command::ChangePeerTrust {
                    peer: key(9),
                    delta: Decimal::new(4, 1),
                })
                .unwrap();
        }
        assert_eq!(state.peers[&key(9)].trust, Decimal::ONE);

        for _ in 0..5 {
            state = state
                .apply(&Command::ChangePeerTrust {
                    peer: key(9),
                    delta: Decimal::new(-6, 1),
                })
                .unwrap();
        }
        assert_eq!(state.peers[&key(9)].trust, Decimal::ZERO);
    }

    #[test]
    fn test_set_peer_permission_replaces_set() {
        let state = base_state();
        let next = state
            .apply(&Command::SetPeerPermission {
                peer: key(9),
                permission: PeerPermission {
                    join_network: true,
                    join_validation: false,
                },
            })
            .unwrap();
        assert!(!next.peers[&key(9)].permission.join_validation);
    }

    #[test]
    fn test_set_chaincode_stores_descriptor() {
        let state = base_state();
        let chaincode = Chaincode {
            code_name: "settle".into(),
            domain_name: "finance".into(),
            ledger_name: "ledger-1".into(),
            language: ChaincodeLanguage::Java8,
            code: vec![1, 2, 3],
        };
        let next = state
            .apply(&Command::SetChaincode {
                chaincode: chaincode.clone(),
            })
            .unwrap();
        assert_eq!(next.find_chaincode("settle"), Some(&chaincode));
    }

    #[test]
    fn test_execute_is_a_no_op() {
        let state = base_state();
        let next = state
            .apply(&Command::Execute { name: "settle".into() })
            .unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn test_add_signatory_idempotent() {
        let state = base_state();
        let command = Command::AddSignatory {
            account: key(1),
            signatories: vec![key(5), key(6)],
        };

        let once = state.apply(&command).unwrap();
        let twice = once.apply(&command).unwrap();

        assert_eq!(once.accounts[&key(1)].signatories, twice.accounts[&key(1)].signatories);
        assert_eq!(once.accounts[&key(1)].signatories.len(), 2);
    }

    #[test]
    fn test_set_accounts_use_keys_all_or_nothing() {
        let state = base_state();
        let command = Command::SetAccountsUseKeys {
            accounts: vec![key(1), key(99)],
            use_keys: 2,
        };

        let err = state.apply(&command).unwrap_err();
        assert!(matches!(
            err,
            Error::StateConflict(StateConflict::NotFound(_))
        ));
        // No partial mutation
        assert_eq!(state.accounts[&key(1)].use_keys, 1);

        let ok = state
            .apply(&Command::SetAccountsUseKeys {
                accounts: vec![key(1), key(2)],
                use_keys: 2,
            })
            .unwrap();
        assert_eq!(ok.accounts[&key(1)].use_keys, 2);
        assert_eq!(ok.accounts[&key(2)].use_keys, 2);
    }
}
