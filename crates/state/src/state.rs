//! The replicated exchange ledger
//!
//! Holds the token registry, the dense account arena, the NFT registry,
//! the on-chain request queues, the block log and the three-level Merkle
//! commitment. Mutation is single-writer: the block replicator applies one
//! block at a time, then calls [`ExchangeState::commit_trees`] to flush the
//! dirty leaves and obtain the new root.

use crate::account::{Account, Balance, Nft, StorageSlot, Token};
use crate::block::Block;
use crate::error::StateError;
use crate::queues::{Deposit, OnchainWithdrawal};
use crate::transactions::Transaction;
use crate::types::{
    is_nft_token, AccountId, TokenId, ACCOUNT_TREE_DEPTH, BALANCE_TREE_DEPTH, NUM_STORAGE_SLOTS,
    STORAGE_TREE_DEPTH,
};
use merkle_store::{MerkleProof, MerkleTree};
use primitive_types::{H160, H256, U256};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// The three-level tree commitment: one storage tree per touched balance,
/// one balance tree per touched account, one account tree.
///
/// Untouched subtrees are represented by their precomputed empty roots, so
/// the genesis root is a constant and trees are only materialized for
/// leaves that ever changed.
#[derive(Clone, Debug)]
pub struct LedgerTrees {
    empty_storage_root: H256,
    empty_balance_root: H256,
    empty_account_leaf: H256,
    genesis_root: H256,
    account_tree: MerkleTree,
    balance_trees: HashMap<AccountId, MerkleTree>,
    storage_trees: HashMap<(AccountId, TokenId), MerkleTree>,
}

impl LedgerTrees {
    pub fn new() -> Self {
        let empty_storage_leaf = StorageSlot::default().leaf_hash();
        let empty_storage_root = MerkleTree::new(STORAGE_TREE_DEPTH, empty_storage_leaf).root();
        let empty_balance_leaf = Balance::default().leaf_hash(empty_storage_root);
        let empty_balance_root = MerkleTree::new(BALANCE_TREE_DEPTH, empty_balance_leaf).root();
        let empty_account_leaf = Account::default().leaf_hash(empty_balance_root);
        let account_tree = MerkleTree::new(ACCOUNT_TREE_DEPTH, empty_account_leaf);
        let genesis_root = account_tree.root();
        Self {
            empty_storage_root,
            empty_balance_root,
            empty_account_leaf,
            genesis_root,
            account_tree,
            balance_trees: HashMap::new(),
            storage_trees: HashMap::new(),
        }
    }

    pub fn root(&self) -> H256 {
        self.account_tree.root()
    }

    pub fn genesis_root(&self) -> H256 {
        self.genesis_root
    }

    pub fn empty_storage_root(&self) -> H256 {
        self.empty_storage_root
    }

    pub fn empty_balance_root(&self) -> H256 {
        self.empty_balance_root
    }

    pub fn empty_account_leaf(&self) -> H256 {
        self.empty_account_leaf
    }

    pub(crate) fn storage_tree(
        &mut self,
        account_id: AccountId,
        token_id: TokenId,
    ) -> &mut MerkleTree {
        let empty_leaf = StorageSlot::default().leaf_hash();
        self.storage_trees
            .entry((account_id, token_id))
            .or_insert_with(|| MerkleTree::new(STORAGE_TREE_DEPTH, empty_leaf))
    }

    pub(crate) fn balance_tree(&mut self, account_id: AccountId) -> &mut MerkleTree {
        let empty_storage_root = self.empty_storage_root;
        self.balance_trees.entry(account_id).or_insert_with(|| {
            MerkleTree::new(
                BALANCE_TREE_DEPTH,
                Balance::default().leaf_hash(empty_storage_root),
            )
        })
    }

    pub fn storage_root(&self, account_id: AccountId, token_id: TokenId) -> H256 {
        self.storage_trees
            .get(&(account_id, token_id))
            .map(|t| t.root())
            .unwrap_or(self.empty_storage_root)
    }

    pub fn balances_root(&self, account_id: AccountId) -> H256 {
        self.balance_trees
            .get(&account_id)
            .map(|t| t.root())
            .unwrap_or(self.empty_balance_root)
    }

    pub(crate) fn account_tree_mut(&mut self) -> &mut MerkleTree {
        &mut self.account_tree
    }

    pub fn account_proof(&self, account_id: AccountId) -> Result<MerkleProof, StateError> {
        Ok(self.account_tree.create_proof(account_id as u64)?)
    }

    pub fn balance_proof(
        &self,
        account_id: AccountId,
        token_id: TokenId,
    ) -> Result<MerkleProof, StateError> {
        match self.balance_trees.get(&account_id) {
            Some(tree) => Ok(tree.create_proof(token_id as u64)?),
            None => {
                // Never-touched account: proof comes from a fresh empty tree.
                let tree = MerkleTree::new(
                    BALANCE_TREE_DEPTH,
                    Balance::default().leaf_hash(self.empty_storage_root),
                );
                Ok(tree.create_proof(token_id as u64)?)
            }
        }
    }
}

impl Default for LedgerTrees {
    fn default() -> Self {
        Self::new()
    }
}

/// The full replicated ledger for one exchange contract.
#[derive(Clone, Debug)]
pub struct ExchangeState {
    exchange: H160,
    owner: H160,
    operator: H160,
    protocol_taker_fee_bips: u8,
    protocol_maker_fee_bips: u8,
    shutdown_timestamp: Option<u64>,
    withdrawal_mode_timestamp: Option<u64>,

    tokens: Vec<Token>,
    accounts: Vec<Account>,
    nfts: HashMap<H256, Nft>,
    deposits: Vec<Deposit>,
    onchain_withdrawals: Vec<OnchainWithdrawal>,
    blocks: Vec<Block>,
    processed_requests: Vec<Transaction>,

    trees: LedgerTrees,
    dirty_accounts: BTreeSet<AccountId>,
    dirty_balances: BTreeSet<(AccountId, TokenId)>,
    dirty_slots: BTreeSet<(AccountId, TokenId, u32)>,
}

impl ExchangeState {
    /// Fresh ledger at genesis. Account 0 (the protocol-fee recipient) is
    /// created with all-zero fields, which hashes to the default account
    /// leaf, so the genesis root is the fully-empty tree root.
    pub fn new(exchange: H160) -> Self {
        Self {
            exchange,
            owner: H160::zero(),
            operator: H160::zero(),
            protocol_taker_fee_bips: 0,
            protocol_maker_fee_bips: 0,
            shutdown_timestamp: None,
            withdrawal_mode_timestamp: None,
            tokens: Vec::new(),
            accounts: vec![Account::default()],
            nfts: HashMap::new(),
            deposits: Vec::new(),
            onchain_withdrawals: Vec::new(),
            blocks: Vec::new(),
            processed_requests: Vec::new(),
            trees: LedgerTrees::new(),
            dirty_accounts: BTreeSet::new(),
            dirty_balances: BTreeSet::new(),
            dirty_slots: BTreeSet::new(),
        }
    }

    pub fn exchange(&self) -> H160 {
        self.exchange
    }

    pub fn owner(&self) -> H160 {
        self.owner
    }

    pub fn operator(&self) -> H160 {
        self.operator
    }

    pub fn protocol_fee_bips(&self) -> (u8, u8) {
        (self.protocol_taker_fee_bips, self.protocol_maker_fee_bips)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_timestamp.is_some()
    }

    pub fn is_in_withdrawal_mode(&self) -> bool {
        self.withdrawal_mode_timestamp.is_some()
    }

    pub fn set_owner(&mut self, owner: H160) {
        self.owner = owner;
    }

    pub fn set_operator(&mut self, operator: H160) {
        self.operator = operator;
    }

    pub fn set_protocol_fees(&mut self, taker_bips: u8, maker_bips: u8) {
        self.protocol_taker_fee_bips = taker_bips;
        self.protocol_maker_fee_bips = maker_bips;
    }

    pub fn set_shutdown(&mut self, timestamp: u64) {
        self.shutdown_timestamp = Some(timestamp);
    }

    pub fn set_withdrawal_mode(&mut self, timestamp: u64) {
        self.withdrawal_mode_timestamp = Some(timestamp);
    }

    // ---- tokens --------------------------------------------------------

    /// Register the next token. Ids must arrive densely in on-chain order.
    pub fn register_token(&mut self, token_id: TokenId, address: H160) -> Result<(), StateError> {
        if token_id as usize != self.tokens.len() {
            return Err(StateError::UnexpectedIndex {
                kind: "token",
                expected: self.tokens.len() as u64,
                actual: token_id as u64,
            });
        }
        self.tokens.push(Token {
            token_id,
            address,
            enabled: true,
        });
        Ok(())
    }

    pub fn get_token(&self, token_id: TokenId) -> Result<&Token, StateError> {
        self.tokens
            .get(token_id as usize)
            .ok_or(StateError::OutOfRange {
                kind: "token",
                index: token_id as u64,
                limit: self.tokens.len() as u64,
            })
    }

    pub fn find_token(&self, address: H160) -> Option<&Token> {
        self.tokens.iter().find(|t| t.address == address)
    }

    // ---- accounts ------------------------------------------------------

    pub fn num_accounts(&self) -> u64 {
        self.accounts.len() as u64
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<&Account, StateError> {
        self.accounts
            .get(account_id as usize)
            .ok_or(StateError::OutOfRange {
                kind: "account",
                index: account_id as u64,
                limit: self.accounts.len() as u64,
            })
    }

    /// Dense-arena account creation: an existing id is returned as-is, the
    /// next id is created, anything further ahead is a divergence.
    pub fn get_or_create_account(
        &mut self,
        account_id: AccountId,
    ) -> Result<&mut Account, StateError> {
        if account_id as usize > self.accounts.len() {
            return Err(StateError::UnexpectedIndex {
                kind: "account",
                expected: self.accounts.len() as u64,
                actual: account_id as u64,
            });
        }
        if account_id as usize == self.accounts.len() {
            self.accounts.push(Account::default());
        }
        self.dirty_accounts.insert(account_id);
        Ok(&mut self.accounts[account_id as usize])
    }

    fn check_account(&self, account_id: AccountId) -> Result<(), StateError> {
        if account_id as usize >= self.accounts.len() {
            return Err(StateError::OutOfRange {
                kind: "account",
                index: account_id as u64,
                limit: self.accounts.len() as u64,
            });
        }
        Ok(())
    }

    pub fn account_mut(&mut self, account_id: AccountId) -> Result<&mut Account, StateError> {
        self.check_account(account_id)?;
        self.dirty_accounts.insert(account_id);
        Ok(&mut self.accounts[account_id as usize])
    }

    /// Mutable balance slot; the account must already exist.
    pub fn balance_mut(
        &mut self,
        account_id: AccountId,
        token_id: TokenId,
    ) -> Result<&mut Balance, StateError> {
        self.check_account(account_id)?;
        self.dirty_accounts.insert(account_id);
        self.dirty_balances.insert((account_id, token_id));
        Ok(self.accounts[account_id as usize]
            .balances
            .entry(token_id)
            .or_default())
    }

    /// Mutable storage slot under (account, token); the slot a claim lands
    /// in is `storage_id % NUM_STORAGE_SLOTS`.
    pub fn storage_mut(
        &mut self,
        account_id: AccountId,
        token_id: TokenId,
        storage_id: u32,
    ) -> Result<&mut StorageSlot, StateError> {
        self.check_account(account_id)?;
        let slot_index = storage_id % NUM_STORAGE_SLOTS;
        self.dirty_accounts.insert(account_id);
        self.dirty_balances.insert((account_id, token_id));
        self.dirty_slots.insert((account_id, token_id, slot_index));
        Ok(self.accounts[account_id as usize]
            .balances
            .entry(token_id)
            .or_default()
            .storage
            .entry(slot_index)
            .or_default())
    }

    pub fn credit(
        &mut self,
        account_id: AccountId,
        token_id: TokenId,
        amount: U256,
    ) -> Result<(), StateError> {
        if amount.is_zero() {
            // Still records the touch so the leaf exists in the tree.
            self.balance_mut(account_id, token_id)?;
            return Ok(());
        }
        let balance = self.balance_mut(account_id, token_id)?;
        balance.balance = balance
            .balance
            .checked_add(amount)
            .ok_or(StateError::AmountOverflow)?;
        Ok(())
    }

    /// Debit `amount`; a debit that zeroes an NFT balance also clears its
    /// descriptor so the slot is reusable.
    pub fn debit(
        &mut self,
        account_id: AccountId,
        token_id: TokenId,
        amount: U256,
    ) -> Result<(), StateError> {
        let balance = self.balance_mut(account_id, token_id)?;
        if balance.balance < amount {
            return Err(StateError::BalanceUnderflow {
                account: account_id,
                token: token_id,
                balance: balance.balance,
                debit: amount,
            });
        }
        balance.balance -= amount;
        if balance.balance.is_zero() && is_nft_token(token_id) {
            balance.weight_amm = U256::zero();
        }
        Ok(())
    }

    // ---- NFTs ----------------------------------------------------------

    pub fn get_nft(&self, hash: H256) -> Option<&Nft> {
        self.nfts.get(&hash)
    }

    /// Register an NFT descriptor. The hash binds every field, so an
    /// existing entry under the same hash is already identical.
    pub fn register_nft(&mut self, nft: Nft) {
        self.nfts.entry(nft.hash()).or_insert(nft);
    }

    // ---- queues --------------------------------------------------------

    pub fn add_deposit(&mut self, deposit: Deposit) {
        self.deposits.push(deposit);
    }

    pub fn deposits(&self) -> &[Deposit] {
        &self.deposits
    }

    pub fn add_onchain_withdrawal(
        &mut self,
        withdrawal: OnchainWithdrawal,
    ) -> Result<(), StateError> {
        if withdrawal.withdrawal_idx as usize != self.onchain_withdrawals.len() {
            return Err(StateError::UnexpectedIndex {
                kind: "withdrawal",
                expected: self.onchain_withdrawals.len() as u64,
                actual: withdrawal.withdrawal_idx,
            });
        }
        self.onchain_withdrawals.push(withdrawal);
        Ok(())
    }

    pub fn onchain_withdrawals(&self) -> &[OnchainWithdrawal] {
        &self.onchain_withdrawals
    }

    /// Link the first unlinked deposit matching (owner, token, amount) to
    /// its consuming slot. Returns whether a match was found.
    pub fn link_deposit(
        &mut self,
        owner: H160,
        token_id: TokenId,
        amount: U256,
        block_idx: u64,
        request_idx: u64,
    ) -> bool {
        for deposit in self.deposits.iter_mut() {
            if !deposit.is_linked()
                && deposit.owner == owner
                && deposit.token_id == token_id
                && deposit.amount == amount
            {
                deposit.link(block_idx, request_idx);
                return true;
            }
        }
        warn!(
            ?owner,
            token_id, %amount, block_idx, "deposit transaction without a matching queue entry"
        );
        false
    }

    /// Link the first unlinked forced withdrawal matching (account, token).
    pub fn link_onchain_withdrawal(
        &mut self,
        account_id: AccountId,
        token_id: TokenId,
        block_idx: u64,
        request_idx: u64,
    ) -> bool {
        for withdrawal in self.onchain_withdrawals.iter_mut() {
            if !withdrawal.is_linked()
                && withdrawal.account_id == account_id
                && withdrawal.token_id == token_id
            {
                withdrawal.link(block_idx, request_idx);
                return true;
            }
        }
        warn!(
            account_id,
            token_id, block_idx, "forced withdrawal without a matching queue entry"
        );
        false
    }

    // ---- blocks --------------------------------------------------------

    pub fn num_blocks(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn get_block(&self, block_idx: u64) -> Result<&Block, StateError> {
        self.blocks
            .get(block_idx as usize)
            .ok_or(StateError::OutOfRange {
                kind: "block",
                index: block_idx,
                limit: self.blocks.len() as u64,
            })
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn total_requests_processed(&self) -> u64 {
        self.processed_requests.len() as u64
    }

    pub fn processed_requests(&self) -> &[Transaction] {
        &self.processed_requests
    }

    /// Append a replicated block and its per-slot request log entries.
    /// Only the block replicator calls this, after the root check passed.
    pub fn append_block(
        &mut self,
        block: Block,
        requests: Vec<Transaction>,
    ) -> Result<(), StateError> {
        if block.block_idx != self.blocks.len() as u64 {
            return Err(StateError::UnexpectedIndex {
                kind: "block",
                expected: self.blocks.len() as u64,
                actual: block.block_idx,
            });
        }
        self.processed_requests.extend(requests);
        self.blocks.push(block);
        Ok(())
    }

    /// Record the block fee from the `BlockSubmitted` event; the payload
    /// itself does not carry it.
    pub fn set_block_fee(&mut self, block_idx: u64, fee: U256) -> Result<(), StateError> {
        let limit = self.blocks.len() as u64;
        let block = self
            .blocks
            .get_mut(block_idx as usize)
            .ok_or(StateError::OutOfRange {
                kind: "block",
                index: block_idx,
                limit,
            })?;
        block.block_fee = fee;
        Ok(())
    }

    // ---- tree commitment -----------------------------------------------

    pub fn root(&self) -> H256 {
        self.trees.root()
    }

    pub fn genesis_root(&self) -> H256 {
        self.trees.genesis_root()
    }

    pub fn trees(&self) -> &LedgerTrees {
        &self.trees
    }

    /// Flush the dirty leaves bottom-up (storage, then balance, then
    /// account) and return the new account-tree root.
    pub fn commit_trees(&mut self) -> Result<H256, StateError> {
        let slots = std::mem::take(&mut self.dirty_slots);
        for (account_id, token_id, slot_index) in slots {
            let leaf = self.accounts[account_id as usize]
                .balances
                .get(&token_id)
                .and_then(|b| b.storage.get(&slot_index))
                .map(StorageSlot::leaf_hash)
                .unwrap_or_else(|| StorageSlot::default().leaf_hash());
            self.trees
                .storage_tree(account_id, token_id)
                .update(slot_index as u64, leaf)?;
            self.dirty_balances.insert((account_id, token_id));
        }

        let balances = std::mem::take(&mut self.dirty_balances);
        for (account_id, token_id) in balances {
            let storage_root = self.trees.storage_root(account_id, token_id);
            let leaf = self.accounts[account_id as usize]
                .balances
                .get(&token_id)
                .map(|b| b.leaf_hash(storage_root))
                .unwrap_or_else(|| Balance::default().leaf_hash(storage_root));
            self.trees
                .balance_tree(account_id)
                .update(token_id as u64, leaf)?;
            self.dirty_accounts.insert(account_id);
        }

        let accounts = std::mem::take(&mut self.dirty_accounts);
        for account_id in accounts {
            let balances_root = self.trees.balances_root(account_id);
            let leaf = self.accounts[account_id as usize].leaf_hash(balances_root);
            self.trees.account_tree.update(account_id as u64, leaf)?;
        }

        Ok(self.trees.root())
    }
}
