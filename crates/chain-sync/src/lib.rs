//! Chain Synchronizer
//!
//! Follows the exchange contract on the settlement chain: decodes its
//! events once at the boundary into a closed [`ChainEvent`] enum, applies
//! them in order to the shared [`exchange_state::ExchangeState`], and hands
//! committed block calldata to the block replicator.

pub mod calldata;
pub mod client;
pub mod compression;
pub mod events;
pub mod synchronizer;

pub use calldata::{decode_submission, encode_submission, CalldataError, CompressionMode};
pub use client::ChainClient;
pub use events::ChainEvent;
pub use synchronizer::Synchronizer;
