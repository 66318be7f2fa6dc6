//! Settlement-chain access boundary

use crate::events::ChainEvent;
use async_trait::async_trait;

/// Injected capability for reading the settlement chain. Implementations
/// own the RPC transport and log decoding; the engine never talks to the
/// chain directly.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest chain block number.
    async fn chain_head(&self) -> anyhow::Result<u64>;

    /// All exchange events emitted in chain blocks `from..=to`, in order.
    async fn events_in_range(&self, from: u64, to: u64) -> anyhow::Result<Vec<ChainEvent>>;
}
