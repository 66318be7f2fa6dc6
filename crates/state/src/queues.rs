//! On-chain request queues
//!
//! Deposits and forced withdrawals enter through L1 events and are consumed
//! by in-block transactions. Entries are append-only, strictly ordered, and
//! linked to the consuming block exactly once.

use crate::types::{AccountId, TokenId};
use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};

/// Pending deposit observed on chain, waiting for an in-block deposit
/// transaction to credit it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub owner: H160,
    pub token_id: TokenId,
    pub amount: U256,
    pub fee: U256,
    /// Block that consumed this entry, set once during replication.
    pub block_idx: Option<u64>,
    /// Slot within the consuming block.
    pub request_idx: Option<u64>,
}

impl Deposit {
    pub fn new(owner: H160, token_id: TokenId, amount: U256, fee: U256) -> Self {
        Self {
            owner,
            token_id,
            amount,
            fee,
            block_idx: None,
            request_idx: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.block_idx.is_some()
    }

    pub fn link(&mut self, block_idx: u64, request_idx: u64) {
        self.block_idx = Some(block_idx);
        self.request_idx = Some(request_idx);
    }
}

/// Forced withdrawal requested on chain, consumed by a type-2 or type-3
/// withdrawal transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnchainWithdrawal {
    pub withdrawal_idx: u64,
    pub account_id: AccountId,
    pub token_id: TokenId,
    pub amount: U256,
    pub block_idx: Option<u64>,
    pub request_idx: Option<u64>,
}

impl OnchainWithdrawal {
    pub fn new(withdrawal_idx: u64, account_id: AccountId, token_id: TokenId, amount: U256) -> Self {
        Self {
            withdrawal_idx,
            account_id,
            token_id,
            amount,
            block_idx: None,
            request_idx: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.block_idx.is_some()
    }

    pub fn link(&mut self, block_idx: u64, request_idx: u64) {
        self.block_idx = Some(block_idx);
        self.request_idx = Some(request_idx);
    }
}
