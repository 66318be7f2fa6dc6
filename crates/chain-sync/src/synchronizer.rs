//! Chunked event application loop

use crate::calldata::decode_submission;
use crate::client::ChainClient;
use crate::events::ChainEvent;
use anyhow::Context;
use block_replicator::{BlockContext, BlockReplicator};
use exchange_state::{Deposit, ExchangeState, OnchainWithdrawal};
use parking_lot::RwLock;
use primitive_types::{H160, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of chain blocks fetched per iteration.
pub const DEFAULT_CHUNK_SIZE: u64 = 5_000;

/// Drives an [`ExchangeState`] forward from settlement-chain events.
///
/// Events are fetched in chunks of at most `chunk_size` chain blocks and
/// applied in order under a write lock. A rollup block is always applied
/// atomically; between chunks the state is consistent and the loop can be
/// stopped or checkpointed.
pub struct Synchronizer<C> {
    client: C,
    state: Arc<RwLock<ExchangeState>>,
    chunk_size: u64,
    next_chain_block: u64,
}

impl<C: ChainClient> Synchronizer<C> {
    pub fn new(client: C, state: Arc<RwLock<ExchangeState>>, chunk_size: u64) -> Self {
        Self {
            client,
            state,
            chunk_size: chunk_size.max(1),
            next_chain_block: 0,
        }
    }

    /// First chain block that has not been processed yet.
    pub fn next_chain_block(&self) -> u64 {
        self.next_chain_block
    }

    /// Resume from a checkpoint.
    pub fn set_next_chain_block(&mut self, chain_block: u64) {
        self.next_chain_block = chain_block;
    }

    pub async fn sync_to_head(&mut self) -> anyhow::Result<()> {
        let head = self.client.chain_head().await.context("chain head")?;
        self.sync_to(head).await
    }

    /// Process all events up to and including chain block `target`.
    pub async fn sync_to(&mut self, target: u64) -> anyhow::Result<()> {
        while self.next_chain_block <= target {
            let from = self.next_chain_block;
            let to = (from + self.chunk_size - 1).min(target);
            let events = self
                .client
                .events_in_range(from, to)
                .await
                .with_context(|| format!("events in {from}..={to}"))?;
            debug!(from, to, count = events.len(), "processing event chunk");

            let mut state = self.state.write();
            for event in events {
                apply_event(&mut state, event)?;
            }
            drop(state);
            self.next_chain_block = to + 1;
        }
        info!(
            synced_to = target,
            blocks = self.state.read().num_blocks(),
            "synchronized"
        );
        Ok(())
    }
}

fn apply_event(state: &mut ExchangeState, event: ChainEvent) -> anyhow::Result<()> {
    match event {
        ChainEvent::TokenRegistered {
            token_id,
            token_address,
        } => {
            state.register_token(token_id, token_address)?;
        }
        ChainEvent::DepositRequested {
            owner,
            token_address,
            amount,
            fee,
        } => match state.find_token(token_address) {
            Some(token) => {
                let token_id = token.token_id;
                state.add_deposit(Deposit::new(owner, token_id, amount, fee));
            }
            None => {
                warn!(?token_address, "deposit for an unregistered token");
            }
        },
        ChainEvent::WithdrawalRequested {
            withdrawal_idx,
            account_id,
            token_id,
            amount,
        } => {
            state.add_onchain_withdrawal(OnchainWithdrawal::new(
                withdrawal_idx,
                account_id,
                token_id,
                amount,
            ))?;
        }
        ChainEvent::BlockSubmitted {
            block_idx,
            block_fee,
            timestamp,
            operator,
            origin,
            calldata,
        } => {
            apply_submission(
                state, block_idx, block_fee, timestamp, operator, origin, &calldata,
            )?;
        }
        ChainEvent::Shutdown { timestamp } => {
            info!(timestamp, "exchange shut down");
            state.set_shutdown(timestamp);
        }
        ChainEvent::WithdrawalModeActivated { timestamp } => {
            info!(timestamp, "withdrawal mode activated");
            state.set_withdrawal_mode(timestamp);
        }
        ChainEvent::OperatorChanged { new_operator, .. } => {
            state.set_operator(new_operator);
        }
        ChainEvent::ProtocolFeesUpdated {
            taker_bips,
            maker_bips,
        } => {
            state.set_protocol_fees(taker_bips, maker_bips);
        }
        ChainEvent::OwnershipTransferred { new_owner, .. } => {
            state.set_owner(new_owner);
        }
    }
    Ok(())
}

fn apply_submission(
    state: &mut ExchangeState,
    first_block_idx: u64,
    block_fee: U256,
    timestamp: u64,
    operator: H160,
    origin: H160,
    calldata: &[u8],
) -> anyhow::Result<()> {
    let records = match decode_submission(calldata, state.exchange()) {
        Ok(records) => records,
        // The submission never committed anything for this exchange;
        // replay errors below are fatal, this is not.
        Err(err) => {
            warn!(%err, block_idx = first_block_idx, "skipping undecodable submission");
            return Ok(());
        }
    };

    for (i, record) in records.iter().enumerate() {
        let ctx = BlockContext {
            block_idx: first_block_idx + i as u64,
            timestamp,
            operator,
            origin,
        };
        BlockReplicator::new(state)
            .replicate(record, &ctx)
            .with_context(|| format!("replicating block {}", ctx.block_idx))?;
    }
    if !records.is_empty() {
        // The fee is paid per submission and recorded on its first block.
        state.set_block_fee(first_block_idx, block_fee)?;
    }
    Ok(())
}
