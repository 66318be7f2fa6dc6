//! Fixed-depth quaternary Merkle tree
//!
//! Leaves are addressed by the base-4 digits of their index, most
//! significant digit first. Updates rehash the touched path and insert the
//! new nodes next to the old ones; the `root` pointer is the only mutable
//! state, which is what makes snapshot reads and proof verification safe
//! against a root captured between updates.

use crate::hash::{hash_nodes, NUM_CHILDREN};
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Merkle tree errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("address {address} outside tree capacity {capacity}")]
    AddressOutOfRange { address: u64, capacity: u64 },

    #[error("missing tree node {hash:?}")]
    MissingNode { hash: H256 },

    #[error("freshly created proof failed self-verification")]
    ProofSelfCheck,
}

/// Inclusion proof for one leaf.
///
/// `siblings` holds, for each of the `depth` levels (most-significant
/// level first), the three child hashes that were not on the walked path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub address: u64,
    pub leaf: H256,
    pub root: H256,
    pub siblings: Vec<[H256; NUM_CHILDREN - 1]>,
}

/// Fixed-depth authenticated tree with content-addressed nodes.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    depth: usize,
    root: H256,
    nodes: HashMap<H256, [H256; NUM_CHILDREN]>,
}

impl MerkleTree {
    /// Build a fully-default tree of `depth` levels over `default_leaf`,
    /// precomputing and storing one default node per level.
    pub fn new(depth: usize, default_leaf: H256) -> Self {
        let mut nodes = HashMap::new();
        let mut current = default_leaf;
        for _ in 0..depth {
            let children = [current; NUM_CHILDREN];
            let parent = hash_nodes(&children);
            nodes.insert(parent, children);
            current = parent;
        }
        Self {
            depth,
            root: current,
            nodes,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> H256 {
        self.root
    }

    /// Number of addressable leaves.
    pub fn capacity(&self) -> u64 {
        1u64 << (2 * self.depth as u64)
    }

    /// Base-4 digits of `address`, most significant first.
    fn digits(&self, address: u64) -> Result<Vec<usize>, MerkleError> {
        if self.depth < 32 && address >= self.capacity() {
            return Err(MerkleError::AddressOutOfRange {
                address,
                capacity: self.capacity(),
            });
        }
        Ok((0..self.depth)
            .rev()
            .map(|level| ((address >> (2 * level)) & 0b11) as usize)
            .collect())
    }

    fn children_of(&self, hash: H256) -> Result<[H256; NUM_CHILDREN], MerkleError> {
        self.nodes
            .get(&hash)
            .copied()
            .ok_or(MerkleError::MissingNode { hash })
    }

    /// Current leaf value at `address`.
    pub fn get(&self, address: u64) -> Result<H256, MerkleError> {
        let mut current = self.root;
        for digit in self.digits(address)? {
            current = self.children_of(current)?[digit];
        }
        Ok(current)
    }

    /// Replace the leaf at `address` with `value`, rehash the path and
    /// return the new root. Old nodes stay in the store.
    pub fn update(&mut self, address: u64, value: H256) -> Result<H256, MerkleError> {
        let digits = self.digits(address)?;

        let mut path = Vec::with_capacity(self.depth);
        let mut current = self.root;
        for &digit in &digits {
            let children = self.children_of(current)?;
            path.push(children);
            current = children[digit];
        }

        let mut node = value;
        for level in (0..self.depth).rev() {
            let mut children = path[level];
            children[digits[level]] = node;
            let parent = hash_nodes(&children);
            self.nodes.insert(parent, children);
            node = parent;
        }
        self.root = node;
        Ok(self.root)
    }

    /// Build the sibling proof for `address` and self-verify it before
    /// returning.
    pub fn create_proof(&self, address: u64) -> Result<MerkleProof, MerkleError> {
        let digits = self.digits(address)?;

        let mut siblings = Vec::with_capacity(self.depth);
        let mut current = self.root;
        for &digit in &digits {
            let children = self.children_of(current)?;
            let mut level_siblings = [H256::zero(); NUM_CHILDREN - 1];
            let mut si = 0;
            for (i, child) in children.iter().enumerate() {
                if i != digit {
                    level_siblings[si] = *child;
                    si += 1;
                }
            }
            siblings.push(level_siblings);
            current = children[digit];
        }

        let proof = MerkleProof {
            address,
            leaf: current,
            root: self.root,
            siblings,
        };
        if !self.verify_proof(&proof, address, current) {
            return Err(MerkleError::ProofSelfCheck);
        }
        Ok(proof)
    }

    /// Recompute the root from `proof` bottom-up and compare against the
    /// stored root. Read-only.
    pub fn verify_proof(&self, proof: &MerkleProof, address: u64, value: H256) -> bool {
        verify_proof_against_root(self.root, self.depth, proof, address, value)
    }
}

/// Stateless proof verification against an externally supplied root.
pub fn verify_proof_against_root(
    root: H256,
    depth: usize,
    proof: &MerkleProof,
    address: u64,
    value: H256,
) -> bool {
    if proof.siblings.len() != depth {
        return false;
    }
    let mut current = value;
    for level in (0..depth).rev() {
        let digit = ((address >> (2 * (depth - 1 - level))) & 0b11) as usize;
        let level_siblings = &proof.siblings[level];
        let mut children = [H256::zero(); NUM_CHILDREN];
        let mut si = 0;
        for (i, child) in children.iter_mut().enumerate() {
            if i == digit {
                *child = current;
            } else {
                *child = level_siblings[si];
                si += 1;
            }
        }
        current = hash_nodes(&children);
    }
    current == root
}
