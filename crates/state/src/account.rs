//! Ledger entities: tokens, accounts, balances, storage slots and NFTs

use crate::error::StateError;
use crate::types::{is_nft_token, AccountId, StorageId, TokenId};
use merkle_store::hash::{address_word, hash_word};
use merkle_store::hash_tuple;
use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;

/// Registered token. Ids are assigned in strictly increasing on-chain order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: TokenId,
    pub address: H160,
    pub enabled: bool,
}

/// Reusable per-balance storage cell: partial-fill accumulator for trades,
/// replay-protection marker for transfers, withdrawals and mints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSlot {
    pub storage_id: StorageId,
    pub data: U256,
    pub cancelled: bool,
}

impl StorageSlot {
    /// Leaf value in the per-balance storage tree.
    pub fn leaf_hash(&self) -> H256 {
        hash_tuple(&[
            self.data,
            U256::from(self.storage_id),
            U256::from(self.cancelled as u8),
        ])
    }

    /// Accumulate a fill into the slot under the claim rules: an equal
    /// `storage_id` adds to `data`; a higher id with the overwrite flag
    /// resets the slot and advances; anything else is a conflict.
    pub fn accumulate(
        &mut self,
        storage_id: StorageId,
        overwrite: bool,
        delta: U256,
    ) -> Result<(), StateError> {
        if storage_id == self.storage_id {
            if self.cancelled {
                return Err(StateError::StorageSlotCancelled { storage_id });
            }
            self.data = self
                .data
                .checked_add(delta)
                .ok_or(StateError::AmountOverflow)?;
            Ok(())
        } else if storage_id > self.storage_id && overwrite {
            self.storage_id = storage_id;
            self.data = delta;
            self.cancelled = false;
            Ok(())
        } else {
            Err(StateError::StorageIdConflict {
                current: self.storage_id,
                claimed: storage_id,
                overwrite,
            })
        }
    }

    /// Claim the slot as a one-shot replay-protection marker.
    pub fn mark_used(&mut self, storage_id: StorageId) -> Result<(), StateError> {
        if storage_id == self.storage_id {
            if !self.data.is_zero() || self.cancelled {
                return Err(StateError::StorageSlotReused { storage_id });
            }
            self.data = U256::one();
            Ok(())
        } else if storage_id > self.storage_id {
            self.storage_id = storage_id;
            self.data = U256::one();
            self.cancelled = false;
            Ok(())
        } else {
            Err(StateError::StorageIdConflict {
                current: self.storage_id,
                claimed: storage_id,
                overwrite: false,
            })
        }
    }

    /// Cancel the order occupying the slot. A newer id advances the slot
    /// and zeroes its fill; an equal id cancels the live slot in place.
    pub fn cancel(&mut self, order_id: StorageId) -> Result<(), StateError> {
        if order_id == self.storage_id {
            self.cancelled = true;
            Ok(())
        } else if order_id > self.storage_id {
            self.storage_id = order_id;
            self.data = U256::zero();
            self.cancelled = true;
            Ok(())
        } else {
            Err(StateError::StorageIdConflict {
                current: self.storage_id,
                claimed: order_id,
                overwrite: false,
            })
        }
    }
}

/// Per-token balance. `weight_amm` doubles as the AMM pool weight or, for
/// NFT balance slots, the packed NFT descriptor hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub balance: U256,
    pub weight_amm: U256,
    pub storage: BTreeMap<u32, StorageSlot>,
}

impl Balance {
    /// Leaf value in the per-account balance tree.
    pub fn leaf_hash(&self, storage_tree_root: H256) -> H256 {
        hash_tuple(&[self.balance, self.weight_amm, hash_word(storage_tree_root)])
    }
}

/// Ledger account. Account ids are dense, append-only array indices;
/// accounts are created lazily on first reference and never deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub owner: H160,
    pub pub_key_x: H256,
    pub pub_key_y: H256,
    pub nonce: u32,
    pub fee_bips_amm: u32,
    pub balances: BTreeMap<TokenId, Balance>,
}

impl Account {
    /// Leaf value in the top-level account tree.
    pub fn leaf_hash(&self, balances_tree_root: H256) -> H256 {
        hash_tuple(&[
            address_word(self.owner),
            hash_word(self.pub_key_x),
            hash_word(self.pub_key_y),
            U256::from(self.nonce),
            U256::from(self.fee_bips_amm),
            hash_word(balances_tree_root),
        ])
    }

    pub fn balance(&self, token_id: TokenId) -> Option<&Balance> {
        self.balances.get(&token_id)
    }

    /// Token balance, zero if the balance slot was never touched.
    pub fn balance_amount(&self, token_id: TokenId) -> U256 {
        self.balances
            .get(&token_id)
            .map(|b| b.balance)
            .unwrap_or_default()
    }

    /// NFT descriptor hash held in an NFT balance slot, if any.
    pub fn nft_descriptor(&self, token_id: TokenId) -> Option<U256> {
        if !is_nft_token(token_id) {
            return None;
        }
        self.balances
            .get(&token_id)
            .map(|b| b.weight_amm)
            .filter(|w| !w.is_zero())
    }
}

/// Immutable NFT descriptor, registered once on first mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    pub minter: H160,
    pub nft_type: u8,
    pub token_address: H160,
    pub nft_id: H256,
    pub creator_fee_bips: u8,
}

impl Nft {
    /// Content hash keying the NFT registry and stamped into the holding
    /// balance's `weight_amm`.
    pub fn hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        hasher.update(self.minter.as_bytes());
        hasher.update([self.nft_type]);
        hasher.update(self.token_address.as_bytes());
        hasher.update(self.nft_id.as_bytes());
        hasher.update([self.creator_fee_bips]);
        H256::from_slice(&hasher.finalize())
    }

    /// The descriptor hash widened to a `weight_amm` word.
    pub fn descriptor_word(&self) -> U256 {
        U256::from_big_endian(self.hash().as_bytes())
    }
}

/// Tracks which account/balance/slot leaves must be rehashed at the next
/// tree commit. A dirty slot implies its balance and account are dirty.
pub type DirtyAccounts = std::collections::BTreeSet<AccountId>;
pub type DirtyBalances = std::collections::BTreeSet<(AccountId, TokenId)>;
pub type DirtySlots = std::collections::BTreeSet<(AccountId, TokenId, u32)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_accumulate_same_id() {
        let mut slot = StorageSlot::default();
        slot.accumulate(0, false, U256::from(10)).unwrap();
        slot.accumulate(0, false, U256::from(5)).unwrap();
        assert_eq!(slot.data, U256::from(15));
    }

    #[test]
    fn test_storage_overwrite_resets_data() {
        let mut slot = StorageSlot::default();
        slot.accumulate(0, false, U256::from(10)).unwrap();
        slot.accumulate(16_384, true, U256::from(7)).unwrap();
        assert_eq!(slot.storage_id, 16_384);
        assert_eq!(slot.data, U256::from(7));
    }

    #[test]
    fn test_storage_higher_id_without_overwrite_conflicts() {
        let mut slot = StorageSlot::default();
        let err = slot.accumulate(16_384, false, U256::one()).unwrap_err();
        assert_eq!(
            err,
            StateError::StorageIdConflict {
                current: 0,
                claimed: 16_384,
                overwrite: false,
            }
        );
    }

    #[test]
    fn test_storage_regression_conflicts() {
        let mut slot = StorageSlot::default();
        slot.accumulate(16_384, true, U256::one()).unwrap();
        assert!(slot.accumulate(0, true, U256::one()).is_err());
        assert!(slot.mark_used(0).is_err());
    }

    #[test]
    fn test_marker_reuse_is_rejected() {
        let mut slot = StorageSlot::default();
        slot.mark_used(3).unwrap();
        assert_eq!(slot.data, U256::one());
        let err = slot.mark_used(3).unwrap_err();
        assert_eq!(err, StateError::StorageSlotReused { storage_id: 3 });
    }

    #[test]
    fn test_cancel_newer_id_zeroes_fill() {
        let mut slot = StorageSlot::default();
        slot.accumulate(0, false, U256::from(100)).unwrap();
        slot.cancel(16_384).unwrap();
        assert!(slot.cancelled);
        assert_eq!(slot.data, U256::zero());
        assert_eq!(slot.storage_id, 16_384);
        // No further fills for the cancelled id.
        assert!(slot.accumulate(16_384, false, U256::one()).is_err());
    }

    #[test]
    fn test_leaf_hash_covers_all_fields() {
        let slot = StorageSlot::default();
        let mut filled = slot.clone();
        filled.data = U256::one();
        let mut cancelled = slot.clone();
        cancelled.cancelled = true;
        assert_ne!(slot.leaf_hash(), filled.leaf_hash());
        assert_ne!(slot.leaf_hash(), cancelled.leaf_hash());
        assert_ne!(filled.leaf_hash(), cancelled.leaf_hash());
    }

    #[test]
    fn test_nft_hash_binds_every_field() {
        let nft = Nft {
            minter: H160::repeat_byte(1),
            nft_type: 0,
            token_address: H160::repeat_byte(2),
            nft_id: H256::repeat_byte(3),
            creator_fee_bips: 10,
        };
        let mut other = nft.clone();
        other.creator_fee_bips = 11;
        assert_ne!(nft.hash(), other.hash());
        assert_eq!(nft.hash(), nft.clone().hash());
    }
}
