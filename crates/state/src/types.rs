//! Ledger-wide identifiers and tree parameters

/// Dense account index into the account arena.
pub type AccountId = u32;

/// Dense token index; ids at or above [`NFT_TOKEN_ID_START`] address NFT
/// balance slots instead of registry tokens.
pub type TokenId = u16;

/// Monotonic identifier a transaction claims for a storage slot.
pub type StorageId = u32;

/// Account tree depth: 4^16 = 2^32 addressable accounts.
pub const ACCOUNT_TREE_DEPTH: usize = 16;

/// Balance tree depth: 4^8 = 2^16 addressable token slots per account.
pub const BALANCE_TREE_DEPTH: usize = 8;

/// Storage tree depth: 4^7 slots per balance.
pub const STORAGE_TREE_DEPTH: usize = 7;

/// Number of reusable storage slots per balance; a claim lands in slot
/// `storage_id % NUM_STORAGE_SLOTS`.
pub const NUM_STORAGE_SLOTS: u32 = 1 << (2 * STORAGE_TREE_DEPTH as u32);

/// First token id of the NFT balance-slot range.
pub const NFT_TOKEN_ID_START: TokenId = 0x8000;

/// Reserved protocol-fee recipient account, created at genesis.
pub const PROTOCOL_FEE_ACCOUNT: AccountId = 0;

/// Whether a token id addresses an NFT balance slot.
pub fn is_nft_token(token_id: TokenId) -> bool {
    token_id >= NFT_TOKEN_ID_START
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_slot_count_matches_tree_capacity() {
        assert_eq!(NUM_STORAGE_SLOTS, 16_384);
    }

    #[test]
    fn test_nft_token_range() {
        assert!(!is_nft_token(0));
        assert!(!is_nft_token(0x7fff));
        assert!(is_nft_token(0x8000));
        assert!(is_nft_token(u16::MAX));
    }
}
