//! Proof orchestrator: witness assembly, prover invocation, and contract-
//! layout packing for the three proof shapes (single-input, multi-input,
//! sequential).

use alloy_primitives::Address;
use serde_json::{json, Value};
use zdoge_crypto::{field_to_bytes, Fr};
use zdoge_merkle::DEPTH;

use crate::chain::{ChainReader, MerklePathClient};
use crate::error::{ProofError, WalletError};
use crate::external::{Groth16Proof, Prover, Rpc};
use crate::note::Note;
use crate::reconcile::verify_note_before_spending;
use crate::store::WalletStore;

/// Fixed at compile time: the multi-input circuit spends at most this many
/// notes in a single proof.
pub const MAX_MULTI_INPUTS: usize = 5;

fn hex_field(f: &Fr) -> String {
    format!("0x{}", hex::encode(field_to_bytes(f)))
}

/// The witness material for one spent input note: private opening plus the
/// authentication path, independent of which operation spends it.
#[derive(Clone, Debug)]
pub struct InputWitness {
    pub secret: Fr,
    pub blinding: Fr,
    pub owner_pubkey: Fr,
    pub spending_key: Fr,
    pub path_elements: Vec<Fr>,
    pub path_indices: Vec<bool>,
    pub root: Fr,
    pub nullifier_hash: Fr,
}

impl InputWitness {
    fn to_json(&self) -> Value {
        json!({
            "secret": hex_field(&self.secret),
            "blinding": hex_field(&self.blinding),
            "ownerPubkey": hex_field(&self.owner_pubkey),
            "spendingKey": hex_field(&self.spending_key),
            "pathElements": self.path_elements.iter().map(hex_field).collect::<Vec<_>>(),
            "pathIndices": self.path_indices,
            "root": hex_field(&self.root),
            "nullifierHash": hex_field(&self.nullifier_hash),
        })
    }

    /// The canonical zero-note input used to pad unused multi-input slots:
    /// its nullifier hash and root are deterministic, and the contract side
    /// must treat the slot as inert.
    pub fn zero_slot() -> Self {
        let zero_note = Note::zero_note();
        let spending_key = Fr::from(0u64);
        let nullifier_hash = zero_note.nullifier_hash(spending_key).expect("zero note has leaf_index 0");
        Self {
            secret: zero_note.secret,
            blinding: zero_note.blinding,
            owner_pubkey: zero_note.owner_pubkey,
            spending_key,
            path_elements: vec![Fr::from(0u64); DEPTH],
            path_indices: vec![false; DEPTH],
            root: Fr::from(0u64),
            nullifier_hash,
        }
    }
}

#[derive(Clone, Debug)]
pub enum OperationWitness {
    Shield {
        output: Note,
        amount: u128,
        token: Address,
        sender: Address,
    },
    Transfer {
        input: InputWitness,
        output_commitment_1: Fr,
        output_commitment_2: Fr,
        relayer: Address,
        fee: u128,
    },
    Unshield {
        input: InputWitness,
        recipient: Address,
        amount: u128,
        change_commitment: Fr,
        relayer: Address,
        fee: u128,
    },
    Swap {
        input: InputWitness,
        output_commitment_1: Fr,
        output_commitment_2: Fr,
        token_in: Address,
        token_out: Address,
        swap_amount: u128,
        output_amount: u128,
    },
}

impl OperationWitness {
    /// Assemble the circuit-facing witness JSON handed to the external
    /// prover. The specific key shape is a contract between this crate and
    /// whatever `wasm`/`zkey` pair the caller supplies -- only this function
    /// needs to change if that contract changes.
    pub fn to_json(&self) -> Value {
        match self {
            OperationWitness::Shield { output, amount, token, sender } => json!({
                "commitment": hex_field(&output.commitment),
                "amount": amount.to_string(),
                "token": token.to_string(),
                "sender": sender.to_string(),
            }),
            OperationWitness::Transfer { input, output_commitment_1, output_commitment_2, relayer, fee } => json!({
                "input": input.to_json(),
                "outputCommitment1": hex_field(output_commitment_1),
                "outputCommitment2": hex_field(output_commitment_2),
                "relayer": relayer.to_string(),
                "fee": fee.to_string(),
            }),
            OperationWitness::Unshield { input, recipient, amount, change_commitment, relayer, fee } => json!({
                "input": input.to_json(),
                "recipient": recipient.to_string(),
                "amount": amount.to_string(),
                "changeCommitment": hex_field(change_commitment),
                "relayer": relayer.to_string(),
                "fee": fee.to_string(),
            }),
            OperationWitness::Swap {
                input,
                output_commitment_1,
                output_commitment_2,
                token_in,
                token_out,
                swap_amount,
                output_amount,
            } => json!({
                "input": input.to_json(),
                "outputCommitment1": hex_field(output_commitment_1),
                "outputCommitment2": hex_field(output_commitment_2),
                "tokenIn": token_in.to_string(),
                "tokenOut": token_out.to_string(),
                "swapAmount": swap_amount.to_string(),
                "outputAmount": output_amount.to_string(),
            }),
        }
    }
}

/// Multi-input transfer witness: up to [`MAX_MULTI_INPUTS`] inputs, padded
/// with [`InputWitness::zero_slot`], spending into exactly two outputs.
#[derive(Clone, Debug)]
pub struct MultiInputWitness {
    pub inputs: Vec<InputWitness>,
    pub output_commitment_1: Fr,
    pub output_commitment_2: Fr,
    pub relayer: Address,
    pub fee: u128,
}

impl MultiInputWitness {
    pub fn new(
        mut inputs: Vec<InputWitness>,
        output_commitment_1: Fr,
        output_commitment_2: Fr,
        relayer: Address,
        fee: u128,
    ) -> Result<Self, WalletError> {
        if inputs.len() > MAX_MULTI_INPUTS {
            return Err(WalletError::Proof(ProofError::MalformedWitness(
                "too many inputs for the multi-input circuit",
            )));
        }
        while inputs.len() < MAX_MULTI_INPUTS {
            inputs.push(InputWitness::zero_slot());
        }
        Ok(Self {
            inputs,
            output_commitment_1,
            output_commitment_2,
            relayer,
            fee,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "inputs": self.inputs.iter().map(InputWitness::to_json).collect::<Vec<_>>(),
            "outputCommitment1": hex_field(&self.output_commitment_1),
            "outputCommitment2": hex_field(&self.output_commitment_2),
            "relayer": self.relayer.to_string(),
            "fee": self.fee.to_string(),
        })
    }
}

/// One step of a sequential-transfer fallback: a single-input transfer
/// whose outputs (recipient note + change note) are distinct per step.
#[derive(Clone, Debug)]
pub struct SequentialStep {
    pub witness: OperationWitness,
    pub recipient_amount: u128,
    pub change_amount: u128,
}

/// `uint256[8] = [A.x, A.y, B[0][1], B[0][0], B[1][1], B[1][0], C.x, C.y]`.
/// The inner G2-pair transposition matches the convention snarkjs-format
/// verifiers expect.
pub fn pack_proof(proof: &Groth16Proof) -> [[u8; 32]; 8] {
    [
        proof.pi_a[0],
        proof.pi_a[1],
        proof.pi_b[0][1],
        proof.pi_b[0][0],
        proof.pi_b[1][1],
        proof.pi_b[1][0],
        proof.pi_c[0],
        proof.pi_c[1],
    ]
}

pub struct ProvenOperation {
    pub packed_proof: [[u8; 32]; 8],
    pub public_signals: Vec<[u8; 32]>,
}

/// Coordinates pre-spend verification, witness assembly, and prover
/// invocation for every operation shape.
pub struct ProofOrchestrator<R: Rpc + Clone, P: Prover> {
    reader: ChainReader<R>,
    merkle: MerklePathClient<R>,
    prover: P,
    pool: Address,
}

impl<R: Rpc + Clone, P: Prover> ProofOrchestrator<R, P> {
    pub fn new(rpc: R, prover: P, pool: Address) -> Self {
        Self {
            reader: ChainReader::new(rpc.clone()),
            merkle: MerklePathClient::new(rpc),
            prover,
            pool,
        }
    }

    pub fn reader(&self) -> &ChainReader<R> {
        &self.reader
    }

    pub fn merkle(&self) -> &MerklePathClient<R> {
        &self.merkle
    }

    pub fn pool(&self) -> Address {
        self.pool
    }

    /// Runs the §4.5.1 pre-generation check sequence, then fetches the
    /// authentication path whose embedded root (not the contract's latest
    /// root) becomes the proof's public root. Fetching the path-embedded
    /// root, rather than a separately-queried "current" root, defeats a
    /// root-rotation race against an in-flight proof.
    pub async fn build_input_witness<K: crate::external::KvStore>(
        &self,
        store: &WalletStore<K>,
        note: &Note,
        spending_key: Fr,
    ) -> Result<InputWitness, WalletError> {
        verify_note_before_spending(store, &self.reader, self.pool, note, spending_key).await?;

        let leaf_index = note.leaf_index.expect("verified notes are confirmed");
        let path = self.merkle.path_for(self.pool, leaf_index).await?;
        let nullifier_hash = note
            .nullifier_hash(spending_key)
            .expect("leaf_index is set");

        Ok(InputWitness {
            secret: note.secret,
            blinding: note.blinding,
            owner_pubkey: note.owner_pubkey,
            spending_key,
            path_elements: path.elements,
            path_indices: path.indices,
            root: path.root,
            nullifier_hash,
        })
    }

    pub async fn prove(
        &self,
        witness: &Value,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<ProvenOperation, WalletError> {
        let proof = self
            .prover
            .prove(witness.clone(), wasm, zkey)
            .await
            .map_err(|e| WalletError::Proof(ProofError::ProverRejected(e.0)))?;
        Ok(ProvenOperation {
            packed_proof: pack_proof(&proof),
            public_signals: proof.public_signals,
        })
    }
}

/// Enforce `Σ input.amount == Σ output.amount + fee (+ platform_fee if swap)`.
/// A violation here is an internal bug, never a user-triggerable condition:
/// coin selection and witness assembly are expected to already guarantee
/// conservation before a proof is ever requested.
pub fn assert_value_conservation(
    inputs_total: u128,
    outputs_total: u128,
    fee: u128,
    platform_fee: u128,
) -> Result<(), WalletError> {
    let rhs = outputs_total
        .checked_add(fee)
        .and_then(|v| v.checked_add(platform_fee));
    match rhs {
        Some(rhs) if rhs == inputs_total => Ok(()),
        _ => {
            debug_assert!(false, "value conservation violated");
            Err(WalletError::ValueConservation(format!(
                "inputs={inputs_total} outputs={outputs_total} fee={fee} platform_fee={platform_fee}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_slot_padding_reaches_max_inputs() {
        let witness = MultiInputWitness::new(vec![], Fr::from(1u64), Fr::from(2u64), Address::ZERO, 0).unwrap();
        assert_eq!(witness.inputs.len(), MAX_MULTI_INPUTS);
    }

    #[test]
    fn too_many_inputs_is_rejected() {
        let inputs = vec![InputWitness::zero_slot(); MAX_MULTI_INPUTS + 1];
        assert!(MultiInputWitness::new(inputs, Fr::from(0u64), Fr::from(0u64), Address::ZERO, 0).is_err());
    }

    #[test]
    fn proof_packing_transposes_the_g2_pair() {
        let proof = Groth16Proof {
            pi_a: [[1u8; 32], [2u8; 32]],
            pi_b: [[[3u8; 32], [4u8; 32]], [[5u8; 32], [6u8; 32]]],
            pi_c: [[7u8; 32], [8u8; 32]],
            public_signals: vec![],
        };
        let packed = pack_proof(&proof);
        assert_eq!(packed[2], [4u8; 32]);
        assert_eq!(packed[3], [3u8; 32]);
        assert_eq!(packed[4], [6u8; 32]);
        assert_eq!(packed[5], [5u8; 32]);
    }

    #[test]
    fn value_conservation_holds_when_balanced() {
        assert!(assert_value_conservation(100, 90, 10, 0).is_ok());
    }

    #[test]
    fn value_conservation_error_surfaces_the_imbalance() {
        assert!(assert_value_conservation(100, 80, 10, 0).is_err());
    }
}
