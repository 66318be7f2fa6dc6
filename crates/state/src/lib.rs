//! Exchange State
//!
//! The mutable off-chain ledger reconstructed from committed rollup blocks:
//! token registry, dense account arena, per-token balances with order
//! storage slots, NFT registry, deposit/withdrawal request queues, the
//! append-only processed-request log and block bookkeeping.
//!
//! The ledger is a single-writer state machine. All mutation happens
//! sequentially during block replication; readers observe roots and
//! balances between complete block applications.

pub mod account;
pub mod block;
pub mod error;
pub mod prover;
pub mod queues;
pub mod state;
pub mod transactions;
pub mod types;

pub use account::{Account, Balance, Nft, StorageSlot, Token};
pub use block::Block;
pub use error::StateError;
pub use prover::{AccountLeaf, BalanceLeaf, WithdrawFromMerkleTreeData, WithdrawalModeProver};
pub use queues::{Deposit, OnchainWithdrawal};
pub use state::ExchangeState;
pub use transactions::{
    AccountUpdateTx, AmmUpdateTx, DepositTx, NftDataTx, NftMintData, NftMintTx, Order,
    OrderCancellationTx, SignatureVerificationTx, SpotTradeTx, Transaction, TransferTx,
    WithdrawalTx,
};
pub use types::{
    is_nft_token, AccountId, StorageId, TokenId, ACCOUNT_TREE_DEPTH, BALANCE_TREE_DEPTH,
    NFT_TOKEN_ID_START, NUM_STORAGE_SLOTS, PROTOCOL_FEE_ACCOUNT, STORAGE_TREE_DEPTH,
};
