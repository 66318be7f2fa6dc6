//! Block Replicator
//!
//! Decodes committed rollup block payloads into typed transactions, applies
//! them to the exchange ledger through the per-type processors, and checks
//! the recomputed Merkle root against the committed one. A mismatch is
//! never tolerated: it means this replica and the chain disagree.

pub mod block;
pub mod builder;
pub mod error;
pub mod processor;
pub mod wire;

pub use block::{BlockContext, BlockRecord, BlockReplicator};
pub use builder::BlockBuilder;
pub use error::ReplayError;
pub use wire::{TX_DATA_SIZE, TX_DATA_SIZE_PART_1, TX_DATA_SIZE_PART_2};
