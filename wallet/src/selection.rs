//! Coin selection: picks input notes for a spend and decides, per note,
//! full-spend vs partial-spend with change.
//!
//! The historical shared-output batch variant (one recipient/change pair
//! distributed evenly across every input) is treated as deprecated per the
//! single-multi-input circuit direction; this module only implements the
//! per-input-output selection path.

use crate::error::SelectionError;
use crate::note::Note;

/// Change amounts at or above this are considered economically worth
/// minting a note for. Selection still emits smaller change when a note's
/// leftover can't be avoided without overspending the target -- conserving
/// value takes priority over avoiding dust.
pub const MIN_CHANGE: u128 = 10_000;

/// If the spend target is within this fraction of total available capacity,
/// selection takes every candidate note rather than searching for a subset.
const FULL_SWEEP_THRESHOLD_BPS: u128 = 9_900; // 99.00%

pub fn note_fee(amount: u128, min_fee: u128, fee_bps: u32) -> u128 {
    let proportional = amount.saturating_mul(fee_bps as u128) / 10_000;
    min_fee.max(proportional)
}

pub fn is_fee_only(amount: u128, min_fee: u128, fee_bps: u32) -> bool {
    amount <= note_fee(amount, min_fee, fee_bps)
}

/// One input note as selection decided to spend it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedSpend<'a> {
    pub note: &'a Note,
    pub fee: u128,
    /// Amount credited to the recipient from this input alone.
    pub recipient_amount: u128,
    /// `0` for a full spend; non-zero for a partial spend. Usually
    /// `>= MIN_CHANGE`, but may be smaller when no other note would land on
    /// the target without overshooting it.
    pub change: u128,
}

impl PlannedSpend<'_> {
    pub fn is_full_spend(&self) -> bool {
        self.change == 0
    }

    fn to_owned_spend(&self) -> OwnedPlannedSpend {
        OwnedPlannedSpend {
            note: self.note.clone(),
            fee: self.fee,
            recipient_amount: self.recipient_amount,
            change: self.change,
        }
    }
}

/// An owned copy of [`PlannedSpend`], for callers that cannot keep the
/// original candidate slice alive (e.g. after releasing a store's read
/// lock).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedPlannedSpend {
    pub note: Note,
    pub fee: u128,
    pub recipient_amount: u128,
    pub change: u128,
}

#[derive(Debug)]
pub struct NoteSelection<'a> {
    pub spends: Vec<PlannedSpend<'a>>,
}

impl NoteSelection<'_> {
    pub fn total_fees(&self) -> u128 {
        self.spends.iter().map(|s| s.fee).sum()
    }

    pub fn total_recipient_amount(&self) -> u128 {
        self.spends.iter().map(|s| s.recipient_amount).sum()
    }

    pub fn total_change(&self) -> u128 {
        self.spends.iter().map(|s| s.change).sum()
    }

    pub fn to_owned_spends(&self) -> Vec<OwnedPlannedSpend> {
        self.spends.iter().map(PlannedSpend::to_owned_spend).collect()
    }
}

/// Select notes from `candidates` (assumed confirmed, i.e. `leaf_index.is_some()`)
/// to cover a spend of `target` base units, using a per-note fee of
/// `max(min_fee, amount * fee_bps / 10000)`.
pub fn select<'a>(
    candidates: &'a [Note],
    target: u128,
    min_fee: u128,
    fee_bps: u32,
) -> Result<NoteSelection<'a>, SelectionError> {
    let available: u128 = candidates.iter().map(|n| n.amount).sum();
    if target > available {
        return Err(SelectionError::Insufficient { target, available });
    }

    let (mut useful, mut fee_only): (Vec<&Note>, Vec<&Note>) = candidates
        .iter()
        .partition(|n| !is_fee_only(n.amount, min_fee, fee_bps));
    useful.sort_by(|a, b| b.amount.cmp(&a.amount));
    fee_only.sort_by(|a, b| b.amount.cmp(&a.amount));

    let take_all = available > 0
        && target.saturating_mul(10_000) >= available.saturating_mul(FULL_SWEEP_THRESHOLD_BPS);

    let mut ordered: Vec<&Note> = Vec::with_capacity(candidates.len());
    if take_all {
        ordered.extend(useful.iter().copied());
        ordered.extend(fee_only.iter().copied());
    } else {
        let mut cumulative: u128 = 0;
        for note in useful.iter().chain(fee_only.iter()) {
            if cumulative >= target {
                break;
            }
            cumulative += note.amount;
            ordered.push(note);
        }
        if cumulative < target {
            return Err(SelectionError::Insufficient { target, available });
        }
    }

    let mut spends = Vec::with_capacity(ordered.len());
    let mut remaining = target;
    for (i, note) in ordered.iter().enumerate() {
        let fee = note_fee(note.amount, min_fee, fee_bps);
        let is_last = i + 1 == ordered.len();

        let (recipient_amount, change) = if !is_last || note.amount <= remaining {
            // Consume the whole note; its full capacity is needed (or it's
            // not the note that crosses the target threshold).
            remaining = remaining.saturating_sub(note.amount);
            (note.amount.saturating_sub(fee), 0u128)
        } else {
            // This note crosses the target: it owes the recipient exactly
            // what's left of the target (minus its own fee), and keeps
            // whatever is left over as change. The recipient's share must
            // never exceed `target - fees`, so the leftover stays change
            // even when it sits below MIN_CHANGE -- a small change note
            // beats silently overspending the target.
            let change = note.amount - remaining;
            let recipient_amount = remaining.saturating_sub(fee);
            remaining = 0;
            (recipient_amount, change)
        };

        if recipient_amount == 0 {
            continue;
        }
        spends.push(PlannedSpend {
            note,
            fee,
            recipient_amount,
            change,
        });
    }

    if spends.is_empty() {
        return Err(SelectionError::Insufficient { target, available });
    }
    Ok(NoteSelection { spends })
}
