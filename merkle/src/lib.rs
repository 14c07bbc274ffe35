//! Fixed-depth commitment Merkle tree.
//!
//! Mirrors the on-chain note-commitment tree: a binary tree of depth
//! [`DEPTH`], pairing siblings with the MiMC-Sponge hash, padding missing
//! siblings with a precomputed "empty subtree" value per level. `root()`
//! tracks a bounded history of recent roots so an authentication path built
//! against a root that has since moved (because other notes were appended)
//! still verifies.

use std::collections::VecDeque;

use thiserror::Error;
use zdoge_crypto::{field_from_u64, mimc2, Fr};

/// Depth of the on-chain commitment tree; fixes capacity at `2^20` leaves.
pub const DEPTH: usize = 20;

/// Minimum number of historical roots retained for authentication-path
/// verification against a slightly stale root.
pub const ROOT_HISTORY_LEN: usize = 500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("tree is full: capacity is {capacity} leaves")]
    Full { capacity: u64 },
    #[error("leaf index {index} is out of range for {leaf_count} leaves")]
    IndexOutOfRange { index: u64, leaf_count: u64 },
    #[error("authentication path has {found} siblings, expected {expected}")]
    PathLengthMismatch { expected: usize, found: usize },
}

fn empty_leaf() -> Fr {
    field_from_u64(0)
}

/// `default_nodes[level]` is the root of an entirely-empty subtree of that
/// level's height, used as the implicit sibling for any position whose
/// sibling has not been written yet.
fn default_nodes(depth: usize) -> Vec<Fr> {
    let mut nodes = Vec::with_capacity(depth + 1);
    nodes.push(empty_leaf());
    for level in 1..=depth {
        let prev = nodes[level - 1];
        nodes.push(mimc2(prev, prev));
    }
    nodes
}

/// An append-only commitment tree with authentication-path generation.
#[derive(Clone)]
pub struct CommitmentTree {
    depth: usize,
    leaf_count: u64,
    default_nodes: Vec<Fr>,
    /// `levels[0]` holds leaves in insertion order; `levels[d]` holds the
    /// nodes at height `d`, also in left-to-right order. Only positions that
    /// have actually been written are stored -- a missing position pairs
    /// with `default_nodes[d]`.
    levels: Vec<Vec<Fr>>,
    root_history: VecDeque<Fr>,
}

impl CommitmentTree {
    /// A tree of the standard depth ([`DEPTH`]).
    pub fn new() -> Self {
        Self::with_depth(DEPTH)
    }

    /// A tree of an explicit depth, for testing or alternate deployments.
    pub fn with_depth(depth: usize) -> Self {
        let default_nodes = default_nodes(depth);
        let root = default_nodes[depth];
        Self {
            depth,
            leaf_count: 0,
            default_nodes,
            levels: vec![Vec::new(); depth + 1],
            root_history: VecDeque::from([root]),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn len(&self) -> u64 {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    pub fn is_full(&self) -> bool {
        self.leaf_count >= self.capacity()
    }

    pub fn root(&self) -> Fr {
        *self.root_history.back().expect("root history is never empty")
    }

    pub fn root_history(&self) -> impl Iterator<Item = &Fr> {
        self.root_history.iter()
    }

    pub fn is_known_root(&self, root: &Fr) -> bool {
        self.root_history.contains(root)
    }

    /// Append a new leaf, returning its index and the resulting root.
    pub fn append(&mut self, leaf: Fr) -> Result<(u64, Fr), MerkleError> {
        if self.is_full() {
            return Err(MerkleError::Full {
                capacity: self.capacity(),
            });
        }

        let index = self.leaf_count;
        self.levels[0].push(leaf);

        let mut pos = index;
        let mut node = leaf;
        for level in 0..self.depth {
            let sibling_index = pos ^ 1;
            let sibling = self.levels[level]
                .get(sibling_index as usize)
                .copied()
                .unwrap_or(self.default_nodes[level]);
            node = if pos % 2 == 0 {
                mimc2(node, sibling)
            } else {
                mimc2(sibling, node)
            };
            pos /= 2;

            let next_level = &mut self.levels[level + 1];
            if pos as usize == next_level.len() {
                next_level.push(node);
            } else {
                next_level[pos as usize] = node;
            }
        }

        self.leaf_count += 1;
        self.root_history.push_back(node);
        if self.root_history.len() > ROOT_HISTORY_LEN {
            self.root_history.pop_front();
        }
        Ok((index, node))
    }

    /// The sibling path from `index` up to (but excluding) the root.
    pub fn authentication_path(&self, index: u64) -> Result<Vec<Fr>, MerkleError> {
        if index >= self.leaf_count {
            return Err(MerkleError::IndexOutOfRange {
                index,
                leaf_count: self.leaf_count,
            });
        }

        let mut path = Vec::with_capacity(self.depth);
        let mut pos = index;
        for level in 0..self.depth {
            let sibling_index = pos ^ 1;
            let sibling = self.levels[level]
                .get(sibling_index as usize)
                .copied()
                .unwrap_or(self.default_nodes[level]);
            path.push(sibling);
            pos /= 2;
        }
        Ok(path)
    }
}

impl Default for CommitmentTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Recompute the root a `leaf` at `index` would produce under `path`.
pub fn compute_root_from_path(leaf: Fr, index: u64, path: &[Fr]) -> Fr {
    let mut node = leaf;
    let mut pos = index;
    for sibling in path {
        node = if pos % 2 == 0 {
            mimc2(node, *sibling)
        } else {
            mimc2(*sibling, node)
        };
        pos /= 2;
    }
    node
}

/// Check that `leaf` at `index` authenticates to `root` under `path`.
pub fn verify_path(leaf: Fr, index: u64, path: &[Fr], root: &Fr, depth: usize) -> Result<bool, MerkleError> {
    if path.len() != depth {
        return Err(MerkleError::PathLengthMismatch {
            expected: depth,
            found: path.len(),
        });
    }
    Ok(compute_root_from_path(leaf, index, path) == *root)
}
