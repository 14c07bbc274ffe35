//! Capability traits the core depends on. Every concrete integration (a
//! browser wallet, an RPC endpoint, a WASM prover, a filesystem) is injected
//! at construction; core code never names one.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExternalError(pub String);

impl ExternalError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The signing wallet: produces a signature over a message it shows the
/// user. The core never inspects signature internals beyond treating it as
/// opaque bytes fed into identity derivation.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, message: &str) -> Result<Vec<u8>, ExternalError>;
}

/// JSON-RPC transport, generic over method name.
#[async_trait]
pub trait Rpc: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ExternalError>;
}

/// The raw Groth16 proof as snarkjs emits it: one G1 point, one G2 point,
/// one G1 point, plus the public signals. The orchestrator -- not the
/// prover -- repacks this into the contract's `uint256[8]` layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Groth16Proof {
    pub pi_a: [[u8; 32]; 2],
    pub pi_b: [[[u8; 32]; 2]; 2],
    pub pi_c: [[u8; 32]; 2],
    pub public_signals: Vec<[u8; 32]>,
}

/// The ZK prover: an external dependency this crate never implements
/// (building the circuit or the prover itself is explicitly out of scope).
#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(
        &self,
        witness: Value,
        wasm: &[u8],
        zkey: &[u8],
    ) -> Result<Groth16Proof, ExternalError>;
}

/// A key-value store backing encrypted persistence.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ExternalError>;
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), ExternalError>;
}

/// Wall-clock time, injected so reconciliation and caching logic are
/// testable without a live clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Randomness, injected so note secrets and AEAD nonces are testable with a
/// deterministic source.
pub trait Rng: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

pub struct OsRng;

impl Rng for OsRng {
    fn fill(&self, buf: &mut [u8]) {
        use rand::RngCore;
        rand::rngs::OsRng.fill_bytes(buf);
    }
}
