//! Replication errors
//!
//! Every variant except the wrapped non-fatal state queries is fatal to
//! replication: the block was accepted on chain, so failing to replay it
//! byte-exactly means the replica is wrong.

use exchange_state::StateError;
use primitive_types::H256;
use rollup_codec::CodecError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("unknown transaction type {tag} in slot {slot}")]
    UnknownTransactionType { tag: u8, slot: usize },

    #[error("missing or malformed NFT aux carrier at slot {slot}")]
    InvalidAuxSlot { slot: usize },

    #[error("unknown withdrawal type {withdrawal_type}")]
    InvalidWithdrawalType { withdrawal_type: u8 },

    #[error("state divergence: committed root {expected:?}, replayed root {actual:?}")]
    StateDivergence { expected: H256, actual: H256 },
}
