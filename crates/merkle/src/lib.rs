//! Merkle Store
//!
//! Fixed-depth, arity-4 authenticated trees used for the layered ledger
//! commitment: a storage tree per balance, a balance tree per account and
//! one account tree on top. Nodes are content-addressed (hash -> children),
//! so old tree versions stay reachable from retained roots.

pub mod hash;
pub mod tree;

pub use hash::{hash_nodes, hash_tuple, NUM_CHILDREN};
pub use tree::{verify_proof_against_root, MerkleError, MerkleProof, MerkleTree};
