//! Operation API: `prepare_X`/`complete_X` pairs for shield, transfer,
//! unshield, and swap (§4.8). Each `prepare_X` selects input notes, builds
//! the witness, and returns a proof-carrying payload ready for the caller
//! to submit to the contract; each `complete_X` takes the leaf indices the
//! caller observed once that transaction confirmed and mutates the note
//! store accordingly. Auto-discovery ([`crate::scanner::ingest_events`])
//! can insert the very same output notes independently of `complete_X`;
//! the store's commitment-uniqueness invariant absorbs the race.

use alloy_primitives::Address;
use zdoge_crypto::Fr;

use crate::error::WalletError;
use crate::external::{Clock, KvStore, Prover, Rng, Rpc};
use crate::note::Note;
use crate::orchestrator::{
    assert_value_conservation, InputWitness, MultiInputWitness, OperationWitness, ProofOrchestrator, MAX_MULTI_INPUTS,
};
use crate::selection::OwnedPlannedSpend;
use crate::store::WalletStore;

/// A freshly-created output note together with the memo ciphertext its
/// owner would decrypt to recover it.
#[derive(Clone, Debug)]
pub struct PendingOutput {
    pub note: Note,
    pub memo: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct PreparedShield {
    pub witness: serde_json::Value,
    pub packed_proof: [[u8; 32]; 8],
    pub public_signals: Vec<[u8; 32]>,
    pub output: Note,
}

#[derive(Clone, Debug)]
pub struct PreparedUnshield {
    pub witness: serde_json::Value,
    pub packed_proof: [[u8; 32]; 8],
    pub public_signals: Vec<[u8; 32]>,
    pub spent_commitment: Fr,
    pub change: Option<PendingOutput>,
}

#[derive(Clone, Debug)]
pub struct PreparedSwap {
    pub witness: serde_json::Value,
    pub packed_proof: [[u8; 32]; 8],
    pub public_signals: Vec<[u8; 32]>,
    pub spent_commitment: Fr,
    pub output: PendingOutput,
    pub change: Option<PendingOutput>,
}

/// One step of a sequential fallback transfer (§4.5.3): shaped exactly
/// like a single-input transfer, since that is what each step is.
#[derive(Clone, Debug)]
pub struct SequentialTransferStep {
    pub witness: serde_json::Value,
    pub packed_proof: [[u8; 32]; 8],
    pub public_signals: Vec<[u8; 32]>,
    pub spent_commitment: Fr,
    pub recipient_output: PendingOutput,
    pub change: Option<PendingOutput>,
}

/// The outcome of [`Wallet::prepare_transfer`], tagged by which of the
/// three proof shapes (§4.5.1-§4.5.3) coin selection called for.
#[derive(Clone, Debug)]
pub enum TransferPlan {
    Single {
        witness: serde_json::Value,
        packed_proof: [[u8; 32]; 8],
        public_signals: Vec<[u8; 32]>,
        spent_commitment: Fr,
        recipient_output: PendingOutput,
        change: Option<PendingOutput>,
    },
    MultiInput {
        witness: serde_json::Value,
        packed_proof: [[u8; 32]; 8],
        public_signals: Vec<[u8; 32]>,
        spent_commitments: Vec<Fr>,
        recipient_output: PendingOutput,
        change: Option<PendingOutput>,
    },
    Sequential(Vec<SequentialTransferStep>),
}

impl TransferPlan {
    pub fn spent_commitments(&self) -> Vec<Fr> {
        match self {
            TransferPlan::Single { spent_commitment, .. } => vec![*spent_commitment],
            TransferPlan::MultiInput { spent_commitments, .. } => spent_commitments.clone(),
            TransferPlan::Sequential(steps) => steps.iter().map(|s| s.spent_commitment).collect(),
        }
    }
}

/// Ties the note store, the proof orchestrator, and the injected
/// [`Rng`]/[`Clock`] capabilities together behind the four user-facing
/// operations. One `Wallet` per identity.
pub struct Wallet<K: KvStore, R: Rpc + Clone, P: Prover> {
    pub store: WalletStore<K>,
    orchestrator: ProofOrchestrator<R, P>,
    rng: Box<dyn Rng>,
    clock: Box<dyn Clock>,
    min_fee: u128,
    fee_bps: u32,
    relayer: Address,
}

impl<K: KvStore, R: Rpc + Clone, P: Prover> Wallet<K, R, P> {
    pub fn new(
        store: WalletStore<K>,
        orchestrator: ProofOrchestrator<R, P>,
        rng: Box<dyn Rng>,
        clock: Box<dyn Clock>,
        min_fee: u128,
        fee_bps: u32,
        relayer: Address,
    ) -> Self {
        Self {
            store,
            orchestrator,
            rng,
            clock,
            min_fee,
            fee_bps,
            relayer,
        }
    }

    fn random_field(&self) -> Fr {
        let mut bytes = [0u8; 31];
        self.rng.fill(&mut bytes);
        zdoge_crypto::field_from_bytes(&bytes)
    }

    fn new_output_note(
        &self,
        amount: u128,
        owner_pubkey: Fr,
        token_symbol: &str,
        token_address: Address,
        token_decimals: u8,
    ) -> Note {
        Note::new(
            amount,
            owner_pubkey,
            self.random_field(),
            self.random_field(),
            token_symbol.to_string(),
            token_address,
            token_decimals,
            self.clock.now_ms(),
        )
    }

    fn pending_output(&self, note: Note, recipient_viewing_key: Fr) -> Result<PendingOutput, WalletError> {
        let memo = crate::memo::encrypt_note(recipient_viewing_key, &note)?;
        Ok(PendingOutput { note, memo })
    }

    async fn single_input_witness(&self, note: &Note) -> Result<InputWitness, WalletError> {
        let spending_key = self.store.spending_key().await;
        self.orchestrator.build_input_witness(&self.store, note, spending_key).await
    }

    /// §4.5.1 shield: no input note, a single freshly-minted output.
    pub async fn prepare_shield(
        &self,
        amount: u128,
        token_symbol: &str,
        token_address: Address,
        token_decimals: u8,
        sender: Address,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<PreparedShield, WalletError> {
        let owner_pubkey = self.store.owner_pubkey().await;
        let output = self.new_output_note(amount, owner_pubkey, token_symbol, token_address, token_decimals);

        let witness = OperationWitness::Shield {
            output: output.clone(),
            amount,
            token: token_address,
            sender,
        };
        assert_value_conservation(amount, output.amount, 0, 0)?;
        let proven = self.orchestrator.prove(&witness.to_json(), wasm, zkey).await?;

        Ok(PreparedShield {
            witness: witness.to_json(),
            packed_proof: proven.packed_proof,
            public_signals: proven.public_signals,
            output,
        })
    }

    /// Call once the shield transaction has confirmed and the output's
    /// on-chain leaf index is known.
    pub async fn complete_shield(&self, mut output: Note, leaf_index: u64) -> Result<bool, WalletError> {
        output.leaf_index = Some(leaf_index);
        self.store.add_discovered(output).await
    }

    /// §4.5.4 coin selection, then dispatch to whichever proof shape the
    /// selected input count calls for: one note -> single-input (§4.5.1),
    /// up to [`MAX_MULTI_INPUTS`] -> one multi-input proof (§4.5.2),
    /// otherwise -> a sequential list of single-input steps (§4.5.3).
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare_transfer(
        &self,
        target_spend: u128,
        token_symbol: &str,
        recipient_pubkey: Fr,
        recipient_viewing_key: Fr,
        single_wasm: &[u8],
        single_zkey: &[u8],
        multi_wasm: &[u8],
        multi_zkey: &[u8],
    ) -> Result<TransferPlan, WalletError> {
        let spends = self
            .store
            .select(token_symbol, target_spend, self.min_fee, self.fee_bps)
            .await?;
        let owner_pubkey = self.store.owner_pubkey().await;
        let self_viewing_key = self.store.viewing_key().await;
        let token_address = spends[0].note.token_address;
        let token_decimals = spends[0].note.token_decimals;

        if spends.len() == 1 {
            let step = self
                .prepare_single_transfer(
                    &spends[0],
                    recipient_pubkey,
                    recipient_viewing_key,
                    owner_pubkey,
                    self_viewing_key,
                    token_symbol,
                    token_address,
                    token_decimals,
                    single_wasm,
                    single_zkey,
                )
                .await?;
            return Ok(TransferPlan::Single {
                witness: step.witness,
                packed_proof: step.packed_proof,
                public_signals: step.public_signals,
                spent_commitment: step.spent_commitment,
                recipient_output: step.recipient_output,
                change: step.change,
            });
        }

        if spends.len() <= MAX_MULTI_INPUTS {
            return self
                .prepare_multi_input_transfer(
                    &spends,
                    recipient_pubkey,
                    recipient_viewing_key,
                    self_viewing_key,
                    token_symbol,
                    token_address,
                    token_decimals,
                    multi_wasm,
                    multi_zkey,
                )
                .await;
        }

        let mut steps = Vec::with_capacity(spends.len());
        for spend in &spends {
            let step = self
                .prepare_single_transfer(
                    spend,
                    recipient_pubkey,
                    recipient_viewing_key,
                    owner_pubkey,
                    self_viewing_key,
                    token_symbol,
                    token_address,
                    token_decimals,
                    single_wasm,
                    single_zkey,
                )
                .await?;
            steps.push(step);
        }
        Ok(TransferPlan::Sequential(steps))
    }

    #[allow(clippy::too_many_arguments)]
    async fn prepare_single_transfer(
        &self,
        spend: &OwnedPlannedSpend,
        recipient_pubkey: Fr,
        recipient_viewing_key: Fr,
        self_owner_pubkey: Fr,
        self_viewing_key: Fr,
        token_symbol: &str,
        token_address: Address,
        token_decimals: u8,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<SequentialTransferStep, WalletError> {
        let input = self.single_input_witness(&spend.note).await?;

        let recipient_note =
            self.new_output_note(spend.recipient_amount, recipient_pubkey, token_symbol, token_address, token_decimals);
        let recipient_output = self.pending_output(recipient_note, recipient_viewing_key)?;

        let change = if spend.change > 0 {
            let change_note = self.new_output_note(spend.change, self_owner_pubkey, token_symbol, token_address, token_decimals);
            Some(self.pending_output(change_note, self_viewing_key)?)
        } else {
            None
        };
        let change_commitment = change.as_ref().map(|c| c.note.commitment).unwrap_or(Fr::from(0u64));

        let witness = OperationWitness::Transfer {
            input,
            output_commitment_1: recipient_output.note.commitment,
            output_commitment_2: change_commitment,
            relayer: self.relayer,
            fee: spend.fee,
        };
        let outputs_total = recipient_output.note.amount + change.as_ref().map_or(0, |c| c.note.amount);
        assert_value_conservation(spend.note.amount, outputs_total, spend.fee, 0)?;
        let proven = self.orchestrator.prove(&witness.to_json(), wasm, zkey).await?;

        Ok(SequentialTransferStep {
            witness: witness.to_json(),
            packed_proof: proven.packed_proof,
            public_signals: proven.public_signals,
            spent_commitment: spend.note.commitment,
            recipient_output,
            change,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn prepare_multi_input_transfer(
        &self,
        spends: &[OwnedPlannedSpend],
        recipient_pubkey: Fr,
        recipient_viewing_key: Fr,
        self_viewing_key: Fr,
        token_symbol: &str,
        token_address: Address,
        token_decimals: u8,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<TransferPlan, WalletError> {
        let mut inputs = Vec::with_capacity(spends.len());
        for spend in spends {
            inputs.push(self.single_input_witness(&spend.note).await?);
        }

        // The contract accepts one shared output pair regardless of input
        // count, so the per-input recipient/change split from selection is
        // only a means to the aggregate totals here, not three separate
        // outputs. See DESIGN.md for why this -- rather than the
        // historical evenly-distributed-per-input variant -- is the
        // implemented interpretation of §4.5.2.
        let total_fee: u128 = spends.iter().map(|s| s.fee).sum();
        let total_recipient: u128 = spends.iter().map(|s| s.recipient_amount).sum();
        let total_change: u128 = spends.iter().map(|s| s.change).sum();
        let self_owner_pubkey = inputs[0].owner_pubkey;

        let recipient_note = self.new_output_note(total_recipient, recipient_pubkey, token_symbol, token_address, token_decimals);
        let recipient_output = self.pending_output(recipient_note, recipient_viewing_key)?;

        let change = if total_change > 0 {
            let change_note = self.new_output_note(total_change, self_owner_pubkey, token_symbol, token_address, token_decimals);
            Some(self.pending_output(change_note, self_viewing_key)?)
        } else {
            None
        };
        let change_commitment = change.as_ref().map(|c| c.note.commitment).unwrap_or(Fr::from(0u64));

        let witness = MultiInputWitness::new(
            inputs,
            recipient_output.note.commitment,
            change_commitment,
            self.relayer,
            total_fee,
        )?;
        let total_inputs: u128 = spends.iter().map(|s| s.note.amount).sum();
        assert_value_conservation(total_inputs, total_recipient + total_change, total_fee, 0)?;
        let proven = self.orchestrator.prove(&witness.to_json(), wasm, zkey).await?;

        Ok(TransferPlan::MultiInput {
            witness: witness.to_json(),
            packed_proof: proven.packed_proof,
            public_signals: proven.public_signals,
            spent_commitments: spends.iter().map(|s| s.note.commitment).collect(),
            recipient_output,
            change,
        })
    }

    /// Remove the spent input(s) and insert whichever outputs belong to
    /// this identity (a recipient-to-self transfer, and/or change), now
    /// that the caller has observed their confirmed leaf indices.
    pub async fn complete_transfer(&self, plan: &TransferPlan, self_outputs: Vec<(Note, u64)>) -> Result<(), WalletError> {
        for commitment in plan.spent_commitments() {
            self.store.remove_by_commitment(commitment).await?;
        }
        for (mut note, leaf_index) in self_outputs {
            note.leaf_index = Some(leaf_index);
            self.store.add_discovered(note).await?;
        }
        Ok(())
    }

    /// §4.5.1 unshield: single input, a public recipient amount, and an
    /// optional change note back to this identity.
    pub async fn prepare_unshield(
        &self,
        token_symbol: &str,
        spend_amount: u128,
        recipient: Address,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<PreparedUnshield, WalletError> {
        let spends = self
            .store
            .select(token_symbol, spend_amount, self.min_fee, self.fee_bps)
            .await?;
        if spends.len() != 1 {
            return Err(WalletError::InvalidArgument(
                "unshield spends exactly one input note in the current circuit",
            ));
        }
        let spend = &spends[0];
        let input = self.single_input_witness(&spend.note).await?;
        let owner_pubkey = self.store.owner_pubkey().await;
        let self_viewing_key = self.store.viewing_key().await;

        let change = if spend.change > 0 {
            let change_note =
                self.new_output_note(spend.change, owner_pubkey, token_symbol, spend.note.token_address, spend.note.token_decimals);
            Some(self.pending_output(change_note, self_viewing_key)?)
        } else {
            None
        };
        let change_commitment = change.as_ref().map(|c| c.note.commitment).unwrap_or(Fr::from(0u64));

        let witness = OperationWitness::Unshield {
            input,
            recipient,
            amount: spend.recipient_amount,
            change_commitment,
            relayer: self.relayer,
            fee: spend.fee,
        };
        let outputs_total = spend.recipient_amount + change.as_ref().map_or(0, |c| c.note.amount);
        assert_value_conservation(spend.note.amount, outputs_total, spend.fee, 0)?;
        let proven = self.orchestrator.prove(&witness.to_json(), wasm, zkey).await?;

        Ok(PreparedUnshield {
            witness: witness.to_json(),
            packed_proof: proven.packed_proof,
            public_signals: proven.public_signals,
            spent_commitment: spend.note.commitment,
            change,
        })
    }

    pub async fn complete_unshield(&self, spent_commitment: Fr, change: Option<(Note, u64)>) -> Result<(), WalletError> {
        self.store.remove_by_commitment(spent_commitment).await?;
        if let Some((mut note, leaf_index)) = change {
            note.leaf_index = Some(leaf_index);
            self.store.add_discovered(note).await?;
        }
        Ok(())
    }

    /// §4.5.1 swap: single input in `token_in`, an output in `token_out`
    /// whose amount is the caller's price quote (price lookup is an
    /// external collaborator, out of scope here), and optional `token_in`
    /// change.
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare_swap(
        &self,
        token_in_symbol: &str,
        token_in_address: Address,
        token_out_address: Address,
        token_out_symbol: &str,
        token_out_decimals: u8,
        swap_amount: u128,
        output_amount: u128,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<PreparedSwap, WalletError> {
        let spends = self
            .store
            .select(token_in_symbol, swap_amount, self.min_fee, self.fee_bps)
            .await?;
        if spends.len() != 1 {
            return Err(WalletError::InvalidArgument(
                "swap spends exactly one input note in the current circuit",
            ));
        }
        let spend = &spends[0];
        let input = self.single_input_witness(&spend.note).await?;
        let owner_pubkey = self.store.owner_pubkey().await;
        let self_viewing_key = self.store.viewing_key().await;

        let output_note = self.new_output_note(output_amount, owner_pubkey, token_out_symbol, token_out_address, token_out_decimals);
        let output = self.pending_output(output_note, self_viewing_key)?;

        let change = if spend.change > 0 {
            let change_note = self.new_output_note(
                spend.change,
                owner_pubkey,
                token_in_symbol,
                token_in_address,
                spend.note.token_decimals,
            );
            Some(self.pending_output(change_note, self_viewing_key)?)
        } else {
            None
        };
        let change_commitment = change.as_ref().map(|c| c.note.commitment).unwrap_or(Fr::from(0u64));

        let witness = OperationWitness::Swap {
            input,
            output_commitment_1: output.note.commitment,
            output_commitment_2: change_commitment,
            token_in: token_in_address,
            token_out: token_out_address,
            swap_amount: spend.recipient_amount,
            output_amount,
        };
        // `output_amount` is denominated in `token_out` and isn't part of
        // this token_in-denominated identity; conservation here just checks
        // that the input note's value splits exactly into the swapped
        // portion, the fee, and any token_in change.
        let token_in_outputs = spend.recipient_amount + change.as_ref().map_or(0, |c| c.note.amount);
        assert_value_conservation(spend.note.amount, token_in_outputs, spend.fee, 0)?;
        let proven = self.orchestrator.prove(&witness.to_json(), wasm, zkey).await?;

        Ok(PreparedSwap {
            witness: witness.to_json(),
            packed_proof: proven.packed_proof,
            public_signals: proven.public_signals,
            spent_commitment: spend.note.commitment,
            output,
            change,
        })
    }

    pub async fn complete_swap(
        &self,
        spent_commitment: Fr,
        output: (Note, u64),
        change: Option<(Note, u64)>,
    ) -> Result<(), WalletError> {
        self.store.remove_by_commitment(spent_commitment).await?;
        let (mut output_note, output_leaf) = output;
        output_note.leaf_index = Some(output_leaf);
        self.store.add_discovered(output_note).await?;
        if let Some((mut note, leaf_index)) = change {
            note.leaf_index = Some(leaf_index);
            self.store.add_discovered(note).await?;
        }
        Ok(())
    }
}
