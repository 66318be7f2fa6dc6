//! Withdrawal-mode exit proofs
//!
//! When the exchange enters withdrawal mode, every user can exit directly
//! against the last committed root. The prover rebuilds the three-level
//! tree from scratch out of the in-memory ledger, checks the rebuilt root
//! against the last replicated block, and produces the Merkle path data an
//! on-chain `withdrawFromMerkleTree` call needs.
//!
//! Rebuilding is a deliberate audit of the incremental trees kept by
//! [`ExchangeState`], not a reuse of them.

use crate::account::Balance;
use crate::error::StateError;
use crate::state::{ExchangeState, LedgerTrees};
use crate::types::{is_nft_token, AccountId, TokenId};
use merkle_store::MerkleProof;
use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Account-leaf preimage fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLeaf {
    pub owner: H160,
    pub pub_key_x: H256,
    pub pub_key_y: H256,
    pub nonce: u32,
    pub fee_bips_amm: u32,
}

/// Balance-leaf preimage fields, with the storage-tree root embedded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLeaf {
    pub balance: U256,
    pub weight_amm: U256,
    pub storage_root: H256,
}

/// Everything an on-chain Merkle-tree withdrawal needs for one
/// (account, token) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawFromMerkleTreeData {
    pub account_id: AccountId,
    pub token_id: TokenId,
    pub account_leaf: AccountLeaf,
    pub balance_leaf: BalanceLeaf,
    /// Descriptor of the held NFT when the token id is NFT-flagged.
    pub nft: Option<crate::account::Nft>,
    pub account_proof: MerkleProof,
    pub balance_proof: MerkleProof,
}

/// Exit-proof generator over a scratch-rebuilt tree.
#[derive(Debug)]
pub struct WithdrawalModeProver<'a> {
    state: &'a ExchangeState,
    trees: LedgerTrees,
}

impl<'a> WithdrawalModeProver<'a> {
    /// Rebuild the full commitment from the ledger and verify it matches
    /// the root of the last replicated block (the genesis constant when no
    /// block was replicated yet).
    pub fn build(state: &'a ExchangeState) -> Result<Self, StateError> {
        let mut trees = LedgerTrees::new();

        for (account_idx, account) in state.accounts().iter().enumerate() {
            let account_id = account_idx as AccountId;
            for (&token_id, balance) in &account.balances {
                for (&slot_index, slot) in &balance.storage {
                    trees
                        .storage_tree(account_id, token_id)
                        .update(slot_index as u64, slot.leaf_hash())?;
                }
                let storage_root = trees.storage_root(account_id, token_id);
                trees
                    .balance_tree(account_id)
                    .update(token_id as u64, balance.leaf_hash(storage_root))?;
            }
            let balances_root = trees.balances_root(account_id);
            let leaf = account.leaf_hash(balances_root);
            if leaf != trees.empty_account_leaf() {
                trees.account_tree_mut().update(account_id as u64, leaf)?;
            }
        }

        let expected = state
            .last_block()
            .map(|b| b.merkle_root)
            .unwrap_or_else(|| trees.genesis_root());
        let actual = trees.root();
        if actual != expected {
            return Err(StateError::RootMismatch { expected, actual });
        }
        info!(accounts = state.num_accounts(), root = ?actual, "rebuilt withdrawal-mode tree");

        Ok(Self { state, trees })
    }

    pub fn root(&self) -> H256 {
        self.trees.root()
    }

    /// Exit data for one (account, token) pair.
    pub fn withdraw_data(
        &self,
        account_id: AccountId,
        token_id: TokenId,
    ) -> Result<WithdrawFromMerkleTreeData, StateError> {
        let account = self.state.get_account(account_id)?;
        // Fungible token ids must be registered; NFT-flagged ids are minted
        // freely and carry no token registry entry.
        if !is_nft_token(token_id) {
            self.state.get_token(token_id)?;
        }
        let balance = account.balance(token_id).cloned().unwrap_or_default();
        let storage_root = self.trees.storage_root(account_id, token_id);

        let nft = if is_nft_token(token_id) && !balance.weight_amm.is_zero() {
            let mut bytes = [0u8; 32];
            balance.weight_amm.to_big_endian(&mut bytes);
            let hash = H256::from(bytes);
            Some(
                self.state
                    .get_nft(hash)
                    .cloned()
                    .ok_or(StateError::UnknownNft { hash })?,
            )
        } else {
            None
        };

        Ok(WithdrawFromMerkleTreeData {
            account_id,
            token_id,
            account_leaf: AccountLeaf {
                owner: account.owner,
                pub_key_x: account.pub_key_x,
                pub_key_y: account.pub_key_y,
                nonce: account.nonce,
                fee_bips_amm: account.fee_bips_amm,
            },
            balance_leaf: BalanceLeaf {
                balance: balance.balance,
                weight_amm: balance.weight_amm,
                storage_root,
            },
            nft,
            account_proof: self.trees.account_proof(account_id)?,
            balance_proof: self.trees.balance_proof(account_id, token_id)?,
        })
    }

    /// The balance leaf hash proven by `withdraw_data`'s balance proof.
    pub fn balance_leaf_hash(&self, account_id: AccountId, token_id: TokenId) -> H256 {
        let storage_root = self.trees.storage_root(account_id, token_id);
        self.state
            .get_account(account_id)
            .ok()
            .and_then(|a| a.balance(token_id))
            .map(|b| b.leaf_hash(storage_root))
            .unwrap_or_else(|| Balance::default().leaf_hash(storage_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merkle_store::tree::verify_proof_against_root;
    use crate::types::{ACCOUNT_TREE_DEPTH, BALANCE_TREE_DEPTH};

    #[test]
    fn test_build_at_genesis_matches_genesis_root() {
        let state = ExchangeState::new(H160::repeat_byte(0xee));
        let prover = WithdrawalModeProver::build(&state).unwrap();
        assert_eq!(prover.root(), state.genesis_root());
    }

    #[test]
    fn test_rebuild_matches_incremental_root() {
        let mut state = ExchangeState::new(H160::repeat_byte(0xee));
        state.get_or_create_account(1).unwrap();
        state.credit(1, 0, U256::from(1_000)).unwrap();
        state.get_or_create_account(2).unwrap();
        state.credit(2, 3, U256::from(77)).unwrap();
        state
            .storage_mut(1, 0, 5)
            .unwrap()
            .accumulate(5, true, U256::from(9))
            .unwrap();
        let root = state.commit_trees().unwrap();

        // Without a block the prover checks against genesis, so fake the
        // comparison by checking the rebuilt root directly.
        let err = WithdrawalModeProver::build(&state).unwrap_err();
        match err {
            StateError::RootMismatch { actual, .. } => assert_eq!(actual, root),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_withdraw_data_proofs_verify() {
        let mut state = ExchangeState::new(H160::repeat_byte(0xee));
        for id in 0..3u16 {
            state
                .register_token(id, H160::repeat_byte(0x20 + id as u8))
                .unwrap();
        }
        state.get_or_create_account(1).unwrap();
        state.account_mut(1).unwrap().owner = H160::repeat_byte(0x11);
        state.credit(1, 2, U256::from(500)).unwrap();
        state.commit_trees().unwrap();

        let prover = match WithdrawalModeProver::build(&state) {
            // No block appended, so the root check fails; rebuild through a
            // state that records the block instead.
            Err(StateError::RootMismatch { .. }) => {
                let root = state.root();
                state
                    .append_block(
                        crate::block::Block {
                            block_idx: 0,
                            block_type: 0,
                            block_size: 0,
                            block_version: 0,
                            data: Vec::new(),
                            operator: H160::zero(),
                            origin: H160::zero(),
                            block_fee: U256::zero(),
                            merkle_root: root,
                            timestamp: 0,
                            num_conditional_txs: 0,
                            operator_account_id: 0,
                            num_requests_processed: 0,
                            total_num_requests_processed: 0,
                        },
                        Vec::new(),
                    )
                    .unwrap();
                WithdrawalModeProver::build(&state).unwrap()
            }
            Ok(p) => p,
            Err(other) => panic!("unexpected error: {other:?}"),
        };

        let data = prover.withdraw_data(1, 2).unwrap();
        assert_eq!(data.balance_leaf.balance, U256::from(500));
        assert!(data.nft.is_none());

        let balances_root = prover.trees.balances_root(1);
        assert!(verify_proof_against_root(
            balances_root,
            BALANCE_TREE_DEPTH,
            &data.balance_proof,
            2,
            prover.balance_leaf_hash(1, 2),
        ));
        let account_leaf = state.get_account(1).unwrap().leaf_hash(balances_root);
        assert!(verify_proof_against_root(
            prover.root(),
            ACCOUNT_TREE_DEPTH,
            &data.account_proof,
            1,
            account_leaf,
        ));
    }

    #[test]
    fn test_withdraw_data_unknown_account() {
        let state = ExchangeState::new(H160::repeat_byte(0xee));
        let prover = WithdrawalModeProver::build(&state).unwrap();
        let err = prover.withdraw_data(9, 0).unwrap_err();
        assert!(matches!(err, StateError::OutOfRange { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_withdraw_data_unregistered_token() {
        let state = ExchangeState::new(H160::repeat_byte(0xee));
        let prover = WithdrawalModeProver::build(&state).unwrap();
        let err = prover.withdraw_data(0, 500).unwrap_err();
        assert!(matches!(err, StateError::OutOfRange { kind: "token", .. }));
        // NFT-flagged ids have no registry entry and stay provable.
        let data = prover
            .withdraw_data(0, crate::types::NFT_TOKEN_ID_START)
            .unwrap();
        assert_eq!(data.balance_leaf.balance, U256::zero());
    }
}
