//! Replicated block record

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

/// A committed rollup block after replication. Immutable once appended,
/// except for `block_fee` which arrives with the `BlockSubmitted` event and
/// may be recorded after the payload was replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_idx: u64,
    pub block_type: u8,
    pub block_size: u16,
    pub block_version: u8,
    pub data: Vec<u8>,
    pub operator: H160,
    pub origin: H160,
    pub block_fee: U256,
    /// Account-tree root after this block was applied.
    pub merkle_root: H256,
    pub timestamp: u64,
    pub num_conditional_txs: u32,
    pub operator_account_id: u32,
    pub num_requests_processed: u64,
    /// Cumulative slot count including this block.
    pub total_num_requests_processed: u64,
}
