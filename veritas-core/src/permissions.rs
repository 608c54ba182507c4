//! Permission resolution
//!
//! Decides whether a transaction creator is authorized for a command by
//! looking up grants at the scope the command touches, and returns the
//! minimal set of keys whose signatures the transaction must carry.

use crate::state::LedgerState;
use crate::types::{
    AssetId, AssetRights, Command, DomainRights, Object, Permission, PublicKey, RootRights,
};
use crate::{Error, Result};
use std::collections::BTreeSet;

/// Authorize a command for a creator against a state snapshot
///
/// Returns the required signer set on success. `Unauthorized` is terminal
/// for the transaction; it is never retried.
pub fn authorize(
    state: &LedgerState,
    creator: &PublicKey,
    command: &Command,
) -> Result<BTreeSet<PublicKey>> {
    let mut signers = BTreeSet::new();
    signers.insert(*creator);

    match command {
        Command::Add { object } => authorize_lifecycle(state, creator, object, Lifecycle::Add)?,
        Command::Remove { object } => {
            authorize_lifecycle(state, creator, object, Lifecycle::Remove)?
        }

        Command::Transfer {
            asset,
            sender,
            receiver,
            ..
        } => {
            authorize_transfer(state, creator, asset, sender, receiver)?;
            // The debited party must co-sign unless it created the transaction
            signers.insert(*sender);
        }

        Command::Execute { .. } => {
            if !state.accounts.contains_key(creator) {
                return Err(Error::Unauthorized(format!(
                    "Execute: creator {creator} is not a registered account"
                )));
            }
        }

        Command::SetPeerTrust { .. }
        | Command::ChangePeerTrust { .. }
        | Command::SetPeerPermission { .. } => {
            require(creator, command.name(), root_rights(state, creator).user_give_permission)?;
        }

        Command::SetChaincode { chaincode } => {
            let allowed = root_rights(state, creator).user_give_permission
                || domain_rights(state, creator, &chaincode.domain_name).user_give_permission;
            require(creator, command.name(), allowed)?;
        }

        Command::AddSignatory { account, .. } => {
            authorize_account_admin(state, creator, account, "AddSignatory")?;
            signers.insert(*account);
        }

        Command::SetAccountsUseKeys { accounts, .. } => {
            for account in accounts {
                authorize_account_admin(state, creator, account, "SetAccountsUseKeys")?;
                signers.insert(*account);
            }
        }
    }

    Ok(signers)
}

#[derive(Clone, Copy)]
enum Lifecycle {
    Add,
    Remove,
}

fn authorize_lifecycle(
    state: &LedgerState,
    creator: &PublicKey,
    object: &Object,
    op: Lifecycle,
) -> Result<()> {
    let root = root_rights(state, creator);
    let allowed = match object {
        Object::Domain(_) => match op {
            Lifecycle::Add => root.domain_add,
            Lifecycle::Remove => root.domain_remove,
        },

        Object::Account(account) => {
            let root_ok = match op {
                Lifecycle::Add => root.user_add,
                Lifecycle::Remove => root.user_remove,
            };
            // Domain admins may manage users inside their own domains only
            let domain_ok = !account.domains.is_empty()
                && account.domains.iter().all(|d| {
                    let rights = domain_rights(state, creator, d);
                    match op {
                        Lifecycle::Add => rights.user_add,
                        Lifecycle::Remove => rights.user_remove,
                    }
                });
            root_ok || domain_ok
        }

        // Peer lifecycle is a ledger-wide decision
        Object::Peer(_) => root.user_give_permission,

        Object::Grant { permission, .. } => match permission.domain_name() {
            None => root.user_give_permission,
            Some(domain) => {
                root.user_give_permission
                    || domain_rights(state, creator, domain).user_give_permission
            }
        },
    };

    let op_name = match op {
        Lifecycle::Add => "Add",
        Lifecycle::Remove => "Remove",
    };
    if allowed {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "{op_name} {}: no matching grant for {creator}",
            object.kind()
        )))
    }
}

fn authorize_transfer(
    state: &LedgerState,
    creator: &PublicKey,
    asset: &AssetId,
    sender: &PublicKey,
    receiver: &PublicKey,
) -> Result<()> {
    if !asset_rights(state, creator, asset).transfer {
        return Err(Error::Unauthorized(format!(
            "Transfer: no transfer grant for {creator} on {asset}"
        )));
    }

    // Cross-domain transfers need the grant at the counterparty's domain too
    for (role, key) in [("sender", sender), ("receiver", receiver)] {
        let account = state.accounts.get(key).ok_or_else(|| {
            Error::Unauthorized(format!("Transfer: {role} {key} is not a registered account"))
        })?;
        if account.domains.contains(&asset.domain) {
            continue;
        }
        let covered = account.domains.iter().any(|d| {
            asset_rights(state, creator, &AssetId::new(asset.name.clone(), d.clone())).transfer
        });
        if !covered {
            return Err(Error::Unauthorized(format!(
                "Transfer: no transfer grant for {creator} on {} in any domain of {role} {key}",
                asset.name
            )));
        }
    }

    Ok(())
}

fn authorize_account_admin(
    state: &LedgerState,
    creator: &PublicKey,
    account: &PublicKey,
    op_name: &str,
) -> Result<()> {
    // Accounts administer themselves without any grant
    if creator == account {
        return Ok(());
    }
    if root_rights(state, creator).user_add {
        return Ok(());
    }

    let target = state.accounts.get(account).ok_or_else(|| {
        Error::Unauthorized(format!("{op_name}: account {account} is not registered"))
    })?;
    let covered = !target.domains.is_empty()
        && target
            .domains
            .iter()
            .all(|d| domain_rights(state, creator, d).user_add);
    if covered {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "{op_name}: no matching grant for {creator} over {account}"
        )))
    }
}

fn require(creator: &PublicKey, command: &str, allowed: bool) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "{command}: no matching grant for {creator}"
        )))
    }
}

/// Ledger-wide rights of a key (all false if no root grant exists)
fn root_rights(state: &LedgerState, key: &PublicKey) -> RootRights {
    state.root_grants.get(key).copied().unwrap_or_default()
}

/// Domain-scoped rights of a key in one domain, folded over all grants
fn domain_rights(state: &LedgerState, key: &PublicKey, domain: &str) -> DomainRights {
    let mut rights = DomainRights::default();
    let grants = state
        .domains
        .get(domain)
        .and_then(|d| d.grants.get(key));
    for permission in grants.into_iter().flatten() {
        if let Permission::Domain { rights: r, .. } = permission {
            rights.user_add |= r.user_add;
            rights.user_remove |= r.user_remove;
            rights.user_give_permission |= r.user_give_permission;
        }
    }
    rights
}

/// Asset-scoped rights of a key on one asset, folded over all grants
fn asset_rights(state: &LedgerState, key: &PublicKey, asset: &AssetId) -> AssetRights {
    let mut rights = AssetRights::default();
    let grants = state
        .domains
        .get(&asset.domain)
        .and_then(|d| d.grants.get(key));
    for permission in grants.into_iter().flatten() {
        if let Permission::Asset { asset: a, rights: r } = permission {
            if a == asset {
                rights.transfer |= r.transfer;
                rights.add |= r.add;
                rights.remove |= r.remove;
                rights.create |= r.create;
            }
        }
    }
    rights
}
