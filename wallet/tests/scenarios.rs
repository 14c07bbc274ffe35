//! End-to-end operational scenarios driving [`Wallet`] against in-memory
//! fakes of every injected capability: no live chain, prover, or filesystem.

use std::collections::{HashMap as StdHashMap, HashSet};
use std::sync::Mutex;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use zdoge_crypto::{field_to_bytes, Fr};
use zdoge_merkle::DEPTH;
use zdoge_wallet::external::{Clock, ExternalError, Groth16Proof, KvStore, Prover, Rng, Rpc};
use zdoge_wallet::{ingest_events, Note, ProofOrchestrator, TransferPlan, Wallet, WalletIdentity, WalletStore};

/// In-memory `KvStore`, mirroring the test double in `store.rs`.
struct MemKv(Mutex<StdHashMap<String, Vec<u8>>>);

impl MemKv {
    fn new() -> Self {
        Self(Mutex::new(StdHashMap::new()))
    }
}

#[async_trait]
impl KvStore for MemKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ExternalError> {
        Ok(self.0.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), ExternalError> {
        self.0.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

fn hex_data(f: &Fr) -> String {
    format!("0x{}", hex::encode(field_to_bytes(f)))
}

/// Tracks, per pool, which commitments and nullifier hashes a test has
/// declared "on-chain" -- standing in for the contract's own storage. Both
/// `eth_call` queries (`commitment_exists`, `is_nullifier_spent`) hit the
/// same JSON-RPC method; a fake distinguishes them only by which set the
/// queried field element lands in, exactly as a real contract call would.
#[derive(Clone)]
struct FakeRpc {
    commitments: std::sync::Arc<Mutex<HashSet<String>>>,
    nullifiers: std::sync::Arc<Mutex<HashSet<String>>>,
}

impl FakeRpc {
    fn new() -> Self {
        Self {
            commitments: std::sync::Arc::new(Mutex::new(HashSet::new())),
            nullifiers: std::sync::Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn confirm_commitment(&self, commitment: Fr) {
        self.commitments.lock().unwrap().insert(hex_data(&commitment));
    }
}

#[async_trait]
impl Rpc for FakeRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ExternalError> {
        match method {
            "eth_call" => {
                let data = params
                    .get("data")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ExternalError::new("missing data"))?
                    .to_string();
                let exists = self.commitments.lock().unwrap().contains(&data) || self.nullifiers.lock().unwrap().contains(&data);
                Ok(json!(exists))
            }
            "zdoge_merklePath" => {
                let leaf_index = params.get("leafIndex").and_then(|v| v.as_u64()).unwrap_or(0);
                let zero = hex_data(&Fr::from(0u64));
                Ok(json!({
                    "elements": vec![zero; DEPTH],
                    "indices": vec![false; DEPTH],
                    "root": hex_data(&Fr::from(leaf_index + 1)),
                }))
            }
            other => Err(ExternalError::new(format!("unexpected rpc method in test: {other}"))),
        }
    }
}

/// Returns a fixed, never-inspected proof: these tests exercise wallet-side
/// witness assembly and note bookkeeping, not a real circuit.
struct FakeProver;

#[async_trait]
impl Prover for FakeProver {
    async fn prove(&self, _witness: Value, _wasm: &[u8], _zkey: &[u8]) -> Result<Groth16Proof, ExternalError> {
        Ok(Groth16Proof {
            pi_a: [[1u8; 32], [2u8; 32]],
            pi_b: [[[3u8; 32], [4u8; 32]], [[5u8; 32], [6u8; 32]]],
            pi_c: [[7u8; 32], [8u8; 32]],
            public_signals: vec![],
        })
    }
}

struct FixedClock(i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Deterministic, low-entropy "randomness": sequential field elements, good
/// enough to produce distinct note secrets/blindings without a real RNG.
struct SequentialRng(Mutex<u64>);

impl SequentialRng {
    fn new() -> Self {
        Self(Mutex::new(1))
    }
}

impl Rng for SequentialRng {
    fn fill(&self, buf: &mut [u8]) {
        let mut counter = self.0.lock().unwrap();
        let value = *counter;
        *counter += 1;
        buf.fill(0);
        let bytes = value.to_be_bytes();
        let start = buf.len().saturating_sub(bytes.len());
        buf[start..].copy_from_slice(&bytes);
    }
}

const DOGE_DECIMALS: u8 = 18;
const NO_WASM: &[u8] = &[];
const NO_ZKEY: &[u8] = &[];

async fn wallet_with(signature: &[u8], rpc: FakeRpc, pool: Address, relayer: Address) -> Wallet<MemKv, FakeRpc, FakeProver> {
    wallet_with_fees(signature, rpc, pool, relayer, 0, 0).await
}

async fn wallet_with_fees(
    signature: &[u8],
    rpc: FakeRpc,
    pool: Address,
    relayer: Address,
    min_fee: u128,
    fee_bps: u32,
) -> Wallet<MemKv, FakeRpc, FakeProver> {
    let identity = WalletIdentity::from_signature(signature.to_vec());
    let store = WalletStore::create(MemKv::new(), "0xwallet".to_string(), None, identity)
        .await
        .unwrap();
    let orchestrator = ProofOrchestrator::new(rpc, FakeProver, pool);
    Wallet::new(store, orchestrator, Box::new(SequentialRng::new()), Box::new(FixedClock(1_000)), min_fee, fee_bps, relayer)
}

#[tokio::test]
async fn s1_shield_then_unshield_full() {
    let pool = Address::repeat_byte(0x01);
    let rpc = FakeRpc::new();
    let wallet = wallet_with(b"s1 signature", rpc.clone(), pool, Address::ZERO).await;

    let amount = 100_000_000_000_000_000_000u128; // 100 DOGE at 18 decimals
    let shielded = wallet
        .prepare_shield(amount, "DOGE", Address::repeat_byte(0xaa), DOGE_DECIMALS, Address::repeat_byte(0xbb), NO_WASM, NO_ZKEY)
        .await
        .unwrap();

    wallet.complete_shield(shielded.output.clone(), 0).await.unwrap();
    let balances = wallet.store.balance_by_token(1_000).await;
    assert_eq!(balances.get("DOGE"), Some(&amount));

    // The output is now on-chain at leaf 0: register it so the upcoming
    // unshield's pre-spend check and path lookup succeed.
    rpc.confirm_commitment(shielded.output.commitment);

    let recipient = Address::repeat_byte(0xcc);
    let prepared = wallet.prepare_unshield("DOGE", amount, recipient, NO_WASM, NO_ZKEY).await.unwrap();
    assert!(prepared.change.is_none(), "a full spend leaves no change note");

    let witness_input = prepared.witness.get("input").and_then(|v| v.get("nullifierHash")).unwrap();
    assert!(witness_input.is_string(), "exactly one nullifier hash is carried by a single-input witness");

    wallet.complete_unshield(prepared.spent_commitment, None).await.unwrap();
    let balances_after = wallet.store.balance_by_token(1_000).await;
    assert_eq!(balances_after.get("DOGE").copied().unwrap_or(0), 0);
    assert_eq!(wallet.store.len().await, 0);
}

#[tokio::test]
async fn s2_partial_unshield_leaves_a_change_note() {
    let pool = Address::repeat_byte(0x02);
    let rpc = FakeRpc::new();
    let wallet = wallet_with(b"s2 signature", rpc.clone(), pool, Address::ZERO).await;

    let shield_amount = 10_000_000u128;
    let shielded = wallet
        .prepare_shield(shield_amount, "DOGE", Address::repeat_byte(0xaa), DOGE_DECIMALS, Address::repeat_byte(0xbb), NO_WASM, NO_ZKEY)
        .await
        .unwrap();
    wallet.complete_shield(shielded.output.clone(), 0).await.unwrap();
    rpc.confirm_commitment(shielded.output.commitment);

    let spend_amount = 3_000_000u128;
    let recipient = Address::repeat_byte(0xcc);
    let prepared = wallet.prepare_unshield("DOGE", spend_amount, recipient, NO_WASM, NO_ZKEY).await.unwrap();

    let change = prepared.change.clone().expect("7,000,000 of change exceeds MIN_CHANGE");
    assert_ne!(change.note.commitment, Fr::from(0u64));
    assert_eq!(change.note.amount, shield_amount - spend_amount);

    let change_commitment_field = prepared
        .witness
        .get("changeCommitment")
        .and_then(|v| v.as_str())
        .unwrap();
    assert_eq!(change_commitment_field, hex_data(&change.note.commitment));

    wallet
        .complete_unshield(prepared.spent_commitment, Some((change.note.clone(), 1)))
        .await
        .unwrap();

    assert_eq!(wallet.store.len().await, 1);
    let stored = wallet.store.get_by_commitment(change.note.commitment).await.unwrap();
    assert_eq!(stored.amount, shield_amount - spend_amount);
    assert_eq!(stored.leaf_index, Some(1));
}

#[tokio::test]
async fn s3_coin_selection_prefers_largest_notes_first() {
    let pool = Address::repeat_byte(0x03);
    let rpc = FakeRpc::new();
    // min_fee is expressed in the same base units as the note amounts.
    let wallet = wallet_with(b"s3 signature", rpc.clone(), pool, Address::ZERO).await;

    let amounts = [1_000u128, 2_000, 3_000, 5_000, 8_000];
    let owner_pubkey = wallet.store.owner_pubkey().await;
    for (i, amount) in amounts.iter().enumerate() {
        let shielded = wallet
            .prepare_shield(*amount, "DOGE", Address::repeat_byte(0xaa), DOGE_DECIMALS, Address::repeat_byte(0xbb), NO_WASM, NO_ZKEY)
            .await
            .unwrap();
        assert_eq!(shielded.output.owner_pubkey, owner_pubkey);
        wallet.complete_shield(shielded.output.clone(), i as u64).await.unwrap();
        rpc.confirm_commitment(shielded.output.commitment);
    }

    let recipient_pubkey = zdoge_crypto::random_field();
    let recipient_viewing_key = zdoge_crypto::random_field();
    let plan = wallet
        .prepare_transfer(10_000, "DOGE", recipient_pubkey, recipient_viewing_key, NO_WASM, NO_ZKEY, NO_WASM, NO_ZKEY)
        .await
        .unwrap();

    // Greedy descending-capacity fill covers a 10,000 target with the two
    // largest notes (8,000 then 5,000); the 5,000 note only needs to supply
    // the remaining 2,000 to the recipient and keeps the other 3,000 as
    // change, so the recipient's total never exceeds the target.
    let spent = plan.spent_commitments();
    assert_eq!(spent.len(), 2);
    match &plan {
        TransferPlan::MultiInput { recipient_output, .. } => {
            assert_eq!(recipient_output.note.amount, 10_000);
        }
        other => panic!("two inputs within MAX_MULTI_INPUTS should produce a multi-input plan, got {other:?}"),
    }
}

#[tokio::test]
async fn s4_fee_only_note_is_excluded_from_transfer() {
    let pool = Address::repeat_byte(0x04);
    let rpc = FakeRpc::new();
    let min_fee = 1_000u128;
    let wallet = wallet_with_fees(b"s4 signature", rpc.clone(), pool, Address::ZERO, min_fee, 0).await;

    let tiny = wallet
        .prepare_shield(500, "DOGE", Address::repeat_byte(0xaa), DOGE_DECIMALS, Address::repeat_byte(0xbb), NO_WASM, NO_ZKEY)
        .await
        .unwrap();
    wallet.complete_shield(tiny.output.clone(), 0).await.unwrap();
    rpc.confirm_commitment(tiny.output.commitment);

    let plenty = wallet
        .prepare_shield(500_000, "DOGE", Address::repeat_byte(0xaa), DOGE_DECIMALS, Address::repeat_byte(0xbb), NO_WASM, NO_ZKEY)
        .await
        .unwrap();
    wallet.complete_shield(plenty.output.clone(), 1).await.unwrap();
    rpc.confirm_commitment(plenty.output.commitment);

    let recipient_pubkey = zdoge_crypto::random_field();
    let recipient_viewing_key = zdoge_crypto::random_field();
    let plan = wallet
        .prepare_transfer(400_000, "DOGE", recipient_pubkey, recipient_viewing_key, NO_WASM, NO_ZKEY, NO_WASM, NO_ZKEY)
        .await
        .unwrap();

    // The 500-unit fee-only note never covers its own fee at min_fee=1,000,
    // so selection must route around it entirely: a single spend of `plenty`.
    match &plan {
        TransferPlan::Single { spent_commitment, recipient_output, .. } => {
            assert_eq!(*spent_commitment, plenty.output.commitment);
            assert!(recipient_output.note.amount > 0);
        }
        other => panic!("expected a single-input plan spending only the large note, got {other:?}"),
    }
}

#[tokio::test]
async fn s5_auto_discovery_ignores_an_already_known_commitment() {
    let pool = Address::repeat_byte(0x05);
    let rpc = FakeRpc::new();
    let wallet = wallet_with(b"s5 signature", rpc, pool, Address::ZERO).await;

    let owner_pubkey = wallet.store.owner_pubkey().await;
    let viewing_key = wallet.store.viewing_key().await;
    let note = Note::new(42, owner_pubkey, zdoge_crypto::random_field(), zdoge_crypto::random_field(), "DOGE".into(), Address::repeat_byte(0xaa), DOGE_DECIMALS, 1_000);
    let memo = zdoge_wallet::memo::encrypt_note(viewing_key, &note).unwrap();

    let event = zdoge_wallet::chain::Event::Transfer {
        block_number: 1,
        commitments: [field_to_bytes(&note.commitment), [0u8; 32]],
        memos: [memo, Vec::new()],
        leaf_indices: [7, 0],
    };
    let clock = FixedClock(1_000);

    let first = ingest_events(&wallet.store, owner_pubkey, viewing_key, &[event.clone()], &clock).await.unwrap();
    assert_eq!(first.notes_discovered, 1);
    assert_eq!(wallet.store.len().await, 1);

    let second = ingest_events(&wallet.store, owner_pubkey, viewing_key, &[event], &clock).await.unwrap();
    assert_eq!(second.notes_discovered, 0);
    assert_eq!(wallet.store.len().await, 1);
}

#[tokio::test]
async fn s6_spend_attempt_on_a_revoked_note_repairs_the_store() {
    let pool = Address::repeat_byte(0x06);
    let rpc = FakeRpc::new();
    let wallet = wallet_with(b"s6 signature", rpc.clone(), pool, Address::ZERO).await;

    let shielded = wallet
        .prepare_shield(1_000, "DOGE", Address::repeat_byte(0xaa), DOGE_DECIMALS, Address::repeat_byte(0xbb), NO_WASM, NO_ZKEY)
        .await
        .unwrap();
    wallet.complete_shield(shielded.output.clone(), 0).await.unwrap();
    // Deliberately never confirm the commitment on the fake chain: it was
    // reorged out, or the shield transaction never actually landed.
    assert_eq!(wallet.store.len().await, 1);

    let err = wallet.prepare_unshield("DOGE", 1_000, Address::repeat_byte(0xcc), NO_WASM, NO_ZKEY).await.unwrap_err();
    assert!(matches!(err, zdoge_wallet::WalletError::Spend(zdoge_wallet::SpendError::NoteNotOnChain(_))));
    assert_eq!(wallet.store.len().await, 0, "the unverifiable note must be removed from the store");
}
