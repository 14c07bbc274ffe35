//! Cleanup & reconciliation: pre-spend verification and periodic sync.
//!
//! Both are expressed as a pure decision function plus an explicit
//! `apply_*` step, so the policy is testable without a live chain: feed the
//! decision function canned query results and assert on the `Repair`/
//! `ReconcileAction` it returns, independently of the store mutation.

use alloy_primitives::Address;
use zdoge_crypto::Fr;

use crate::chain::ChainReader;
use crate::error::{SpendError, WalletError};
use crate::external::{KvStore, Rpc};
use crate::note::Note;
use crate::store::WalletStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    None,
    RemoveNoteNotOnChain,
    RemoveAlreadySpent { leaf_index: u64 },
}

/// Pure pre-spend policy: verify before spend, repair on certain failure.
pub fn decide_pre_spend_repair(commitment_exists: bool, leaf_index: Option<u64>, nullifier_spent: bool) -> Repair {
    if !commitment_exists {
        return Repair::RemoveNoteNotOnChain;
    }
    match leaf_index {
        Some(leaf_index) if nullifier_spent => Repair::RemoveAlreadySpent { leaf_index },
        _ => Repair::None,
    }
}

/// Query the chain and apply [`decide_pre_spend_repair`]. On any repair the
/// note is removed from `store` before the corresponding error is returned.
pub async fn verify_note_before_spending<K: KvStore, R: Rpc>(
    store: &WalletStore<K>,
    reader: &ChainReader<R>,
    pool: Address,
    note: &Note,
    spending_key: Fr,
) -> Result<(), WalletError> {
    let commitment_exists = reader.commitment_exists(pool, note.commitment).await?;
    let nullifier_spent = match note.leaf_index {
        Some(_) => {
            let nullifier_hash = note
                .nullifier_hash(spending_key)
                .expect("leaf_index is set");
            reader.is_nullifier_spent(pool, nullifier_hash).await?
        }
        None => false,
    };

    match decide_pre_spend_repair(commitment_exists, note.leaf_index, nullifier_spent) {
        Repair::None => Ok(()),
        Repair::RemoveNoteNotOnChain => {
            store.remove_by_commitment(note.commitment).await?;
            Err(WalletError::Spend(SpendError::NoteNotOnChain(format!(
                "0x{}",
                hex::encode(zdoge_crypto::field_to_bytes(&note.commitment))
            ))))
        }
        Repair::RemoveAlreadySpent { leaf_index } => {
            store.remove_by_commitment(note.commitment).await?;
            Err(WalletError::Spend(SpendError::AlreadySpent(leaf_index)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Keep,
    ReuseLeafIndex(u64),
    RemoveOrphan,
}

/// Periodic-sync policy, conservative by construction: a note is only ever
/// removed for being unconfirmed and absent, never for "looks spent" -- a
/// confirmed spend is reconciled separately, after re-verifying the
/// nullifier, so history is never lost to a missing indexer response.
pub fn decide_reconciliation(
    known_from_scan: Option<u64>,
    commitment_exists: bool,
    leaf_index: Option<u64>,
) -> ReconcileAction {
    if let Some(leaf_index) = known_from_scan {
        return ReconcileAction::ReuseLeafIndex(leaf_index);
    }
    if commitment_exists {
        return ReconcileAction::Keep;
    }
    match leaf_index {
        Some(_) => ReconcileAction::Keep,
        None => ReconcileAction::RemoveOrphan,
    }
}

/// Apply [`decide_reconciliation`] for one stored note, removing it from
/// `store` when orphaned.
pub async fn apply_reconciliation<K: KvStore, R: Rpc>(
    store: &WalletStore<K>,
    reader: &ChainReader<R>,
    pool: Address,
    note: &Note,
    known_from_scan: Option<u64>,
) -> Result<ReconcileAction, WalletError> {
    let commitment_exists = reader.commitment_exists(pool, note.commitment).await?;
    let action = decide_reconciliation(known_from_scan, commitment_exists, note.leaf_index);
    if action == ReconcileAction::RemoveOrphan {
        store.remove_by_commitment(note.commitment).await?;
    }
    Ok(action)
}

/// Remove a note that is believed to have just been spent. Recomputes the
/// nullifier hash and re-checks it on-chain first; a negative result only
/// logs a warning and proceeds with removal, since by this point the
/// spending transaction has already been submitted and the local store must
/// not fall out of sync with it.
pub async fn remove_after_confirmed_spend<K: KvStore, R: Rpc>(
    store: &WalletStore<K>,
    reader: &ChainReader<R>,
    pool: Address,
    note: &Note,
    spending_key: Fr,
) -> Result<(), WalletError> {
    if let Some(nullifier_hash) = note.nullifier_hash(spending_key) {
        match reader.is_nullifier_spent(pool, nullifier_hash).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                commitment = %hex::encode(zdoge_crypto::field_to_bytes(&note.commitment)),
                "nullifier not yet observed as spent; removing note anyway, the spend tx was submitted"
            ),
            Err(err) => tracing::warn!(%err, "could not re-check nullifier before removal; proceeding"),
        }
    }
    store.remove_by_commitment(note.commitment).await?;
    Ok(())
}
