//! Ledger Errors
//!
//! Everything except `OutOfRange` is fatal: it means either the chain or
//! this replica is provably wrong, and replication must stop rather than
//! continue on a diverged ledger.

use crate::types::{AccountId, StorageId, TokenId};
use merkle_store::MerkleError;
use primitive_types::{H256, U256};
use thiserror::Error;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("{kind} index out of order: expected {expected}, got {actual}")]
    UnexpectedIndex {
        kind: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("merkle root mismatch: expected {expected:?}, computed {actual:?}")]
    RootMismatch { expected: H256, actual: H256 },

    #[error("{kind} {index} out of range ({limit} known)")]
    OutOfRange {
        kind: &'static str,
        index: u64,
        limit: u64,
    },

    #[error("balance underflow on account {account} token {token}: balance {balance}, debit {debit}")]
    BalanceUnderflow {
        account: AccountId,
        token: TokenId,
        balance: U256,
        debit: U256,
    },

    #[error("amount overflow")]
    AmountOverflow,

    #[error("storage id conflict: slot holds {current}, claimed {claimed} (overwrite: {overwrite})")]
    StorageIdConflict {
        current: StorageId,
        claimed: StorageId,
        overwrite: bool,
    },

    #[error("storage slot already used for storage id {storage_id}")]
    StorageSlotReused { storage_id: StorageId },

    #[error("storage slot for storage id {storage_id} is cancelled")]
    StorageSlotCancelled { storage_id: StorageId },

    #[error("nft descriptor mismatch on account {account} token {token}")]
    NftDescriptorMismatch { account: AccountId, token: TokenId },

    #[error("unknown nft {hash:?}")]
    UnknownNft { hash: H256 },

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

impl StateError {
    /// Only range queries are recoverable; every other variant requires
    /// re-synchronization from a known-good block.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StateError::OutOfRange { .. })
    }
}
