//! Chain reader and Merkle-path client: the only components that talk to
//! the network, via the injected [`Rpc`] capability.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use serde_json::json;
use tokio::sync::Mutex;
use zdoge_crypto::{field_to_bytes, Fr};

use crate::error::ChainError;
use crate::external::Rpc;

/// Hard per-call span limit; callers needing more must paginate.
pub const MAX_BLOCK_RANGE: u64 = 10_000;
/// Global cap on events returned across a single logical fetch.
pub const MAX_EVENTS: usize = 100_000;
/// Minimum interval between RPC calls issued by a polling loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const SPOT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const PATH_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Shield {
        block_number: u64,
        commitment: [u8; 32],
        leaf_index: u64,
    },
    Transfer {
        block_number: u64,
        commitments: [[u8; 32]; 2],
        memos: [Vec<u8>; 2],
        leaf_indices: [u64; 2],
    },
    Unshield {
        block_number: u64,
        change_commitment: Option<[u8; 32]>,
        change_leaf_index: Option<u64>,
    },
    Swap {
        block_number: u64,
        commitments: [[u8; 32]; 2],
        memos: [Vec<u8>; 2],
        leaf_indices: [u64; 2],
    },
}

impl Event {
    pub fn block_number(&self) -> u64 {
        match self {
            Event::Shield { block_number, .. }
            | Event::Transfer { block_number, .. }
            | Event::Unshield { block_number, .. }
            | Event::Swap { block_number, .. } => *block_number,
        }
    }
}

/// Fetches on-chain events and answers membership/spent-ness queries.
pub struct ChainReader<R: Rpc> {
    rpc: R,
}

impl<R: Rpc> ChainReader<R> {
    pub fn new(rpc: R) -> Self {
        Self { rpc }
    }

    /// `to_block - from_block` must not exceed [`MAX_BLOCK_RANGE`]; the
    /// result is additionally capped at [`MAX_EVENTS`].
    pub async fn fetch_events(
        &self,
        pool: Address,
        from_block: u64,
        to_block: u64,
        topics: &[B256],
    ) -> Result<Vec<Event>, ChainError> {
        let span = to_block.saturating_sub(from_block);
        if span > MAX_BLOCK_RANGE {
            return Err(ChainError::RangeTooLarge {
                span,
                max: MAX_BLOCK_RANGE,
            });
        }

        let params = json!({
            "address": pool,
            "fromBlock": from_block,
            "toBlock": to_block,
            "topics": topics,
        });
        let raw = self
            .rpc
            .call("eth_getLogs", params)
            .await
            .map_err(|e| ChainError::RpcFailure(e.0))?;

        let logs = raw
            .as_array()
            .ok_or_else(|| ChainError::RpcFailure("eth_getLogs did not return an array".into()))?;

        let mut events = Vec::with_capacity(logs.len().min(MAX_EVENTS));
        for log in logs.iter().take(MAX_EVENTS) {
            match decode_event(log) {
                Some(event) => events.push(event),
                None => return Err(ChainError::InvalidEvent),
            }
        }
        Ok(events)
    }

    pub async fn is_nullifier_spent(&self, pool: Address, nullifier_hash: Fr) -> Result<bool, ChainError> {
        let params = json!({
            "to": pool,
            "data": format!("0x{}", hex::encode(field_to_bytes(&nullifier_hash))),
        });
        let raw = self
            .rpc
            .call("eth_call", params)
            .await
            .map_err(|e| ChainError::RpcFailure(e.0))?;
        Ok(raw.as_bool().unwrap_or(false))
    }

    pub async fn commitment_exists(&self, pool: Address, commitment: Fr) -> Result<bool, ChainError> {
        let params = json!({
            "to": pool,
            "data": format!("0x{}", hex::encode(field_to_bytes(&commitment))),
        });
        let raw = self
            .rpc
            .call("eth_call", params)
            .await
            .map_err(|e| ChainError::RpcFailure(e.0))?;
        Ok(raw.as_bool().unwrap_or(false))
    }
}

fn decode_event(log: &serde_json::Value) -> Option<Event> {
    // Placeholder ABI decode: a real client decodes topics/data against the
    // typed contract interface. Structure kept here so the rest of the
    // pipeline (scanner, reconciliation) has a stable shape to work with.
    let block_number = log.get("blockNumber")?.as_u64()?;
    let kind = log.get("eventName")?.as_str()?;
    match kind {
        "Shield" => Some(Event::Shield {
            block_number,
            commitment: hex32(log.get("commitment"))?,
            leaf_index: log.get("leafIndex")?.as_u64()?,
        }),
        "Transfer" => {
            let (commitments, memos, leaf_indices) = decode_pair_fields(log)?;
            Some(Event::Transfer { block_number, commitments, memos, leaf_indices })
        }
        "Unshield" => Some(Event::Unshield {
            block_number,
            change_commitment: match log.get("changeCommitment") {
                Some(serde_json::Value::Null) | None => None,
                Some(v) => Some(hex32(Some(v))?),
            },
            change_leaf_index: log.get("changeLeafIndex").and_then(|v| v.as_u64()),
        }),
        "Swap" => {
            let (commitments, memos, leaf_indices) = decode_pair_fields(log)?;
            Some(Event::Swap { block_number, commitments, memos, leaf_indices })
        }
        _ => None,
    }
}

/// Shared shape of `Transfer` and `Swap`: two output commitments, each with
/// its own memo ciphertext and confirmed leaf index.
fn decode_pair_fields(log: &serde_json::Value) -> Option<([[u8; 32]; 2], [Vec<u8>; 2], [u64; 2])> {
    let commitments = log.get("commitments")?.as_array()?;
    let memos = log.get("memos")?.as_array()?;
    let leaf_indices = log.get("leafIndices")?.as_array()?;
    if commitments.len() != 2 || memos.len() != 2 || leaf_indices.len() != 2 {
        return None;
    }
    let commitments = [hex32(Some(&commitments[0]))?, hex32(Some(&commitments[1]))?];
    let memos = [hex_bytes(Some(&memos[0]))?, hex_bytes(Some(&memos[1]))?];
    let leaf_indices = [leaf_indices[0].as_u64()?, leaf_indices[1].as_u64()?];
    Some((commitments, memos, leaf_indices))
}

fn hex32(value: Option<&serde_json::Value>) -> Option<[u8; 32]> {
    let bytes = hex_bytes(value)?;
    bytes.try_into().ok()
}

fn hex_bytes(value: Option<&serde_json::Value>) -> Option<Vec<u8>> {
    let s = value?.as_str()?;
    hex::decode(s.trim_start_matches("0x")).ok()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    pub elements: Vec<Fr>,
    pub indices: Vec<bool>,
    pub root: Fr,
}

struct CachedPath {
    path: MerklePath,
    root_at_fetch: Fr,
}

/// Fetches and caches authentication paths from an external indexer.
/// A cache entry is valid as long as the contract root it was fetched
/// against is still current; the caller may flush it explicitly.
pub struct MerklePathClient<R: Rpc> {
    rpc: R,
    cache: Mutex<HashMap<u64, CachedPath>>,
}

impl<R: Rpc> MerklePathClient<R> {
    pub fn new(rpc: R) -> Self {
        Self {
            rpc,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn path_for(&self, pool: Address, leaf_index: u64) -> Result<MerklePath, ChainError> {
        let params = json!({ "pool": pool, "leafIndex": leaf_index });
        let raw = self
            .rpc
            .call("zdoge_merklePath", params)
            .await
            .map_err(|e| ChainError::RpcFailure(e.0))?;

        if raw.is_null() {
            return Err(ChainError::LeafNotIndexed(leaf_index));
        }

        let elements = parse_field_array(raw.get("elements"))?;
        let indices = raw
            .get("indices")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ChainError::RpcFailure("missing indices".into()))?
            .iter()
            .map(|v| v.as_bool().unwrap_or(false))
            .collect();
        let root = parse_field(raw.get("root"))?;

        let path = MerklePath { elements, indices, root };
        let mut cache = self.cache.lock().await;
        cache.insert(leaf_index, CachedPath { path: path.clone(), root_at_fetch: root });
        Ok(path)
    }

    /// Drop every cached path whose root no longer matches `current_root`.
    pub async fn invalidate_stale(&self, current_root: Fr) {
        let mut cache = self.cache.lock().await;
        let before = cache.len();
        cache.retain(|_, cached| cached.root_at_fetch == current_root);
        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, "merkle path cache invalidated after root change");
        }
    }

    pub async fn flush(&self) {
        self.cache.lock().await.clear();
    }
}

fn parse_field(value: Option<&serde_json::Value>) -> Result<Fr, ChainError> {
    let s = value
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChainError::RpcFailure("expected hex field string".into()))?;
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| ChainError::RpcFailure(e.to_string()))?;
    Ok(zdoge_crypto::field_from_bytes(&bytes))
}

fn parse_field_array(value: Option<&serde_json::Value>) -> Result<Vec<Fr>, ChainError> {
    value
        .and_then(|v| v.as_array())
        .ok_or_else(|| ChainError::RpcFailure("expected array of hex field strings".into()))?
        .iter()
        .map(|v| parse_field(Some(v)))
        .collect()
}
