//! Typed per-slot transaction requests
//!
//! One value per block slot, decoded from the packed transaction table.
//! The same types double as the processed-request log entries, so the log
//! has exactly one entry per slot, no-ops and aux carriers included.

use crate::types::{AccountId, StorageId, TokenId};
use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositTx {
    pub owner: H160,
    pub account_id: AccountId,
    pub token_id: TokenId,
    pub amount: U256,
    pub pub_key_x: H256,
    pub pub_key_y: H256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalTx {
    pub withdrawal_type: u8,
    pub owner: H160,
    pub account_id: AccountId,
    pub token_id: TokenId,
    pub amount: U256,
    pub fee_token_id: TokenId,
    pub fee: U256,
    pub storage_id: StorageId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTx {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub token_id: TokenId,
    pub amount: U256,
    pub fee_token_id: TokenId,
    pub fee: U256,
    pub storage_id: StorageId,
    pub to: H160,
}

/// One side of a spot trade, decoded from its packed 16-byte order half.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub storage_id: StorageId,
    pub account_id: AccountId,
    pub token_s: TokenId,
    pub token_b: TokenId,
    pub fill_s: U256,
    /// Fee or rebate bips, per the rebate flag.
    pub fee_bips: u8,
    pub rebate: bool,
    /// Storage overwrite flag from the trade flags byte.
    pub overwrite: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotTradeTx {
    pub order_a: Order,
    pub order_b: Order,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateTx {
    pub update_type: u8,
    pub account_id: AccountId,
    pub fee_token_id: TokenId,
    pub fee: U256,
    pub pub_key_x: H256,
    pub pub_key_y: H256,
    pub wallet_hash: H256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmUpdateTx {
    pub owner: H160,
    pub account_id: AccountId,
    pub token_id: TokenId,
    pub fee_bips: u8,
    pub token_weight: U256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerificationTx {
    pub account_id: AccountId,
    pub data_hash: H256,
}

/// NFT descriptor fields carried by the aux slots following a mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NftMintData {
    /// Mint types 0 and 1: the full descriptor over two carrier slots.
    Descriptor {
        minter: H160,
        nft_type: u8,
        token_address: H160,
        creator_fee_bips: u8,
        nft_id: H256,
    },
    /// Mint type 2: the registered content hash, one carrier slot.
    Hash(H256),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMintTx {
    pub mint_type: u8,
    pub minter_account_id: AccountId,
    pub to_account_id: AccountId,
    pub to_token_id: TokenId,
    pub amount: U256,
    pub fee_token_id: TokenId,
    pub fee: U256,
    pub storage_id: StorageId,
    pub to: H160,
    pub data: NftMintData,
}

/// Aux carrier slot consumed by a preceding mint; the raw bytes are kept
/// so the log stays one entry per slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftDataTx {
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancellationTx {
    pub account_id: AccountId,
    pub token_id: TokenId,
    pub storage_id: StorageId,
    pub fee_token_id: TokenId,
    pub fee: U256,
}

/// One processed block slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Noop,
    Deposit(DepositTx),
    Withdrawal(WithdrawalTx),
    Transfer(TransferTx),
    SpotTrade(SpotTradeTx),
    AccountUpdate(AccountUpdateTx),
    AmmUpdate(AmmUpdateTx),
    SignatureVerification(SignatureVerificationTx),
    NftMint(NftMintTx),
    NftData(NftDataTx),
    OrderCancellation(OrderCancellationTx),
}

impl Transaction {
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Noop => "noop",
            Transaction::Deposit(_) => "deposit",
            Transaction::Withdrawal(_) => "withdrawal",
            Transaction::Transfer(_) => "transfer",
            Transaction::SpotTrade(_) => "spot_trade",
            Transaction::AccountUpdate(_) => "account_update",
            Transaction::AmmUpdate(_) => "amm_update",
            Transaction::SignatureVerification(_) => "signature_verification",
            Transaction::NftMint(_) => "nft_mint",
            Transaction::NftData(_) => "nft_data",
            Transaction::OrderCancellation(_) => "order_cancellation",
        }
    }
}
