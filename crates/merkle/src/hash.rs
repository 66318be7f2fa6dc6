//! Domain hash for tree nodes and leaves
//!
//! Internal nodes hash the concatenation of their four children; leaves
//! hash a tuple of 32-byte big-endian words. Keccak256 keeps both
//! deterministic and non-commutative.

use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

/// Tree branching factor. Power of two; 4 is used throughout the ledger.
pub const NUM_CHILDREN: usize = 4;

/// Hash a full child set into its parent node.
pub fn hash_nodes(children: &[H256; NUM_CHILDREN]) -> H256 {
    let mut hasher = Keccak256::new();
    for child in children {
        hasher.update(child.as_bytes());
    }
    H256::from_slice(&hasher.finalize())
}

/// Hash a tuple of field words into a leaf value.
pub fn hash_tuple(words: &[U256]) -> H256 {
    let mut hasher = Keccak256::new();
    let mut buf = [0u8; 32];
    for word in words {
        word.to_big_endian(&mut buf);
        hasher.update(buf);
    }
    H256::from_slice(&hasher.finalize())
}

/// Widen an address to a leaf tuple word.
pub fn address_word(address: H160) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Widen a hash to a leaf tuple word.
pub fn hash_word(hash: H256) -> U256 {
    U256::from_big_endian(hash.as_bytes())
}
