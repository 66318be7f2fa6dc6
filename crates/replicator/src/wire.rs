//! Packed transaction-slot wire format
//!
//! Each block slot is `TX_DATA_SIZE` bytes, stored on chain as two
//! contiguous regions: all slots' first 48 bytes, then all slots' last 64
//! bytes. Byte 0 of a slot is the type tag; fields follow big-endian at
//! fixed offsets and unused trailing bytes are zero.
//!
//! Decoding is the direction replication depends on; the encode side lives
//! in [`crate::builder`] and mirrors these offsets.

use exchange_state::{
    AccountUpdateTx, AmmUpdateTx, DepositTx, NftMintData, Order, OrderCancellationTx,
    SignatureVerificationTx, SpotTradeTx, TransferTx, WithdrawalTx,
};
use primitive_types::{H160, H256, U256};
use rollup_codec::{CodecError, TxData, FLOAT16, FLOAT24};

/// Fixed per-slot stride.
pub const TX_DATA_SIZE: usize = 112;
/// Bytes of a slot stored in the first payload region.
pub const TX_DATA_SIZE_PART_1: usize = 48;
/// Bytes of a slot stored in the second payload region.
pub const TX_DATA_SIZE_PART_2: usize = 64;

/// Transaction type tags.
pub mod tag {
    pub const NOOP: u8 = 0;
    pub const DEPOSIT: u8 = 1;
    pub const WITHDRAWAL: u8 = 2;
    pub const TRANSFER: u8 = 3;
    pub const SPOT_TRADE: u8 = 4;
    pub const ACCOUNT_UPDATE: u8 = 5;
    pub const AMM_UPDATE: u8 = 6;
    pub const SIGNATURE_VERIFICATION: u8 = 7;
    pub const NFT_MINT: u8 = 8;
    pub const NFT_DATA: u8 = 9;
    pub const ORDER_CANCELLATION: u8 = 10;
}

/// Mint header fields; the descriptor or hash arrives in the following
/// aux carrier slot(s).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NftMintHeader {
    pub mint_type: u8,
    pub minter_account_id: u32,
    pub to_account_id: u32,
    pub to_token_id: u16,
    pub amount: U256,
    pub fee_token_id: u16,
    pub fee: U256,
    pub storage_id: u32,
    pub to: H160,
}

pub fn decode_deposit(data: &TxData) -> Result<DepositTx, CodecError> {
    Ok(DepositTx {
        owner: data.extract_address(1)?,
        account_id: data.extract_uint32(21)?,
        token_id: data.extract_uint16(25)?,
        amount: data.extract_uint96(27)?,
        pub_key_x: data.extract_hash(39)?,
        pub_key_y: data.extract_hash(71)?,
    })
}

pub fn decode_withdrawal(data: &TxData) -> Result<WithdrawalTx, CodecError> {
    Ok(WithdrawalTx {
        withdrawal_type: data.extract_uint8(1)?,
        owner: data.extract_address(2)?,
        account_id: data.extract_uint32(22)?,
        token_id: data.extract_uint16(26)?,
        amount: data.extract_uint96(28)?,
        fee_token_id: data.extract_uint16(40)?,
        fee: FLOAT16.decode(data.extract_uint16(42)? as u32),
        storage_id: data.extract_uint32(44)?,
    })
}

pub fn decode_transfer(data: &TxData) -> Result<TransferTx, CodecError> {
    Ok(TransferTx {
        from_account_id: data.extract_uint32(1)?,
        to_account_id: data.extract_uint32(5)?,
        token_id: data.extract_uint16(9)?,
        amount: FLOAT24.decode(data.extract_uint24(11)?),
        fee_token_id: data.extract_uint16(14)?,
        fee: FLOAT16.decode(data.extract_uint16(16)? as u32),
        storage_id: data.extract_uint32(18)?,
        to: data.extract_address(22)?,
    })
}

fn decode_order(data: &TxData, offset: usize) -> Result<Order, CodecError> {
    let flags = data.extract_uint8(offset + 15)?;
    Ok(Order {
        storage_id: data.extract_uint32(offset)?,
        account_id: data.extract_uint32(offset + 4)?,
        token_s: data.extract_uint16(offset + 8)?,
        token_b: data.extract_uint16(offset + 10)?,
        fill_s: FLOAT24.decode(data.extract_uint24(offset + 12)?),
        fee_bips: flags & 0x3f,
        rebate: flags & 0x80 != 0,
        overwrite: flags & 0x40 != 0,
    })
}

pub fn decode_spot_trade(data: &TxData) -> Result<SpotTradeTx, CodecError> {
    Ok(SpotTradeTx {
        order_a: decode_order(data, 1)?,
        order_b: decode_order(data, 17)?,
    })
}

pub fn decode_account_update(data: &TxData) -> Result<AccountUpdateTx, CodecError> {
    Ok(AccountUpdateTx {
        update_type: data.extract_uint8(1)?,
        account_id: data.extract_uint32(2)?,
        fee_token_id: data.extract_uint16(6)?,
        fee: FLOAT16.decode(data.extract_uint16(8)? as u32),
        pub_key_x: data.extract_hash(10)?,
        pub_key_y: data.extract_hash(42)?,
        wallet_hash: data.extract_hash(74)?,
    })
}

pub fn decode_amm_update(data: &TxData) -> Result<AmmUpdateTx, CodecError> {
    Ok(AmmUpdateTx {
        owner: data.extract_address(1)?,
        account_id: data.extract_uint32(21)?,
        token_id: data.extract_uint16(25)?,
        fee_bips: data.extract_uint8(27)?,
        token_weight: data.extract_uint96(28)?,
    })
}

pub fn decode_signature_verification(
    data: &TxData,
) -> Result<SignatureVerificationTx, CodecError> {
    Ok(SignatureVerificationTx {
        account_id: data.extract_uint32(1)?,
        data_hash: data.extract_hash(5)?,
    })
}

pub fn decode_nft_mint(data: &TxData) -> Result<NftMintHeader, CodecError> {
    Ok(NftMintHeader {
        mint_type: data.extract_uint8(1)?,
        minter_account_id: data.extract_uint32(2)?,
        to_account_id: data.extract_uint32(6)?,
        to_token_id: data.extract_uint16(10)?,
        amount: FLOAT24.decode(data.extract_uint24(12)?),
        fee_token_id: data.extract_uint16(15)?,
        fee: FLOAT16.decode(data.extract_uint16(17)? as u32),
        storage_id: data.extract_uint32(19)?,
        to: data.extract_address(23)?,
    })
}

/// Descriptor carried by the two aux slots after a type-0/1 mint.
pub fn decode_mint_descriptor(
    carrier_1: &TxData,
    carrier_2: &TxData,
) -> Result<NftMintData, CodecError> {
    Ok(NftMintData::Descriptor {
        minter: carrier_1.extract_address(1)?,
        nft_type: carrier_1.extract_uint8(21)?,
        token_address: carrier_1.extract_address(22)?,
        creator_fee_bips: carrier_1.extract_uint8(42)?,
        nft_id: carrier_2.extract_hash(1)?,
    })
}

/// Registered content hash carried by the single aux slot after a type-2
/// mint.
pub fn decode_mint_hash(carrier: &TxData) -> Result<H256, CodecError> {
    carrier.extract_hash(1)
}

pub fn decode_order_cancellation(data: &TxData) -> Result<OrderCancellationTx, CodecError> {
    Ok(OrderCancellationTx {
        account_id: data.extract_uint32(1)?,
        token_id: data.extract_uint16(5)?,
        storage_id: data.extract_uint32(7)?,
        fee_token_id: data.extract_uint16(11)?,
        fee: FLOAT16.decode(data.extract_uint16(13)? as u32),
    })
}
