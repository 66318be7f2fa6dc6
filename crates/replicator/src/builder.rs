//! Block payload construction
//!
//! Encode side of the wire format in [`crate::wire`], used to assemble
//! block payloads for replay tests and tooling. Each `add_*` appends one
//! fixed-stride slot; `build` packs the header and the two slot regions.

use crate::block::BlockRecord;
use crate::wire::{tag, TX_DATA_SIZE, TX_DATA_SIZE_PART_1};
use exchange_state::{
    AccountUpdateTx, AmmUpdateTx, DepositTx, NftMintData, NftMintTx, Order, OrderCancellationTx,
    SignatureVerificationTx, SpotTradeTx, TransferTx, WithdrawalTx,
};
use primitive_types::{H160, H256};
use rollup_codec::{CodecError, TxData, FLOAT16, FLOAT24};

pub struct BlockBuilder {
    exchange: H160,
    merkle_root_before: H256,
    merkle_root_after: H256,
    num_conditional_txs: u32,
    protocol_taker_fee_bips: u8,
    protocol_maker_fee_bips: u8,
    operator_account_id: u32,
    slots: Vec<TxData>,
}

impl BlockBuilder {
    pub fn new(exchange: H160) -> Self {
        Self {
            exchange,
            merkle_root_before: H256::zero(),
            merkle_root_after: H256::zero(),
            num_conditional_txs: 0,
            protocol_taker_fee_bips: 0,
            protocol_maker_fee_bips: 0,
            operator_account_id: 0,
            slots: Vec::new(),
        }
    }

    pub fn set_roots(&mut self, before: H256, after: H256) -> &mut Self {
        self.merkle_root_before = before;
        self.merkle_root_after = after;
        self
    }

    pub fn set_protocol_fees(&mut self, taker_bips: u8, maker_bips: u8) -> &mut Self {
        self.protocol_taker_fee_bips = taker_bips;
        self.protocol_maker_fee_bips = maker_bips;
        self
    }

    pub fn set_operator_account(&mut self, account_id: u32) -> &mut Self {
        self.operator_account_id = account_id;
        self
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    fn push_slot(&mut self, mut data: TxData) {
        data.pad_to(TX_DATA_SIZE);
        self.slots.push(data);
    }

    pub fn add_noop(&mut self) -> &mut Self {
        self.push_slot(TxData::new());
        self
    }

    pub fn add_deposit(&mut self, tx: &DepositTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::DEPOSIT);
        data.add_address(tx.owner);
        data.add_uint32(tx.account_id);
        data.add_uint16(tx.token_id);
        data.add_uint96(tx.amount)?;
        data.add_hash(tx.pub_key_x);
        data.add_hash(tx.pub_key_y);
        self.push_slot(data);
        Ok(self)
    }

    pub fn add_withdrawal(&mut self, tx: &WithdrawalTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::WITHDRAWAL);
        data.add_uint8(tx.withdrawal_type);
        data.add_address(tx.owner);
        data.add_uint32(tx.account_id);
        data.add_uint16(tx.token_id);
        data.add_uint96(tx.amount)?;
        data.add_uint16(tx.fee_token_id);
        data.add_uint16(FLOAT16.encode(tx.fee)? as u16);
        data.add_uint32(tx.storage_id);
        self.push_slot(data);
        Ok(self)
    }

    pub fn add_transfer(&mut self, tx: &TransferTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::TRANSFER);
        data.add_uint32(tx.from_account_id);
        data.add_uint32(tx.to_account_id);
        data.add_uint16(tx.token_id);
        data.add_uint24(FLOAT24.encode(tx.amount)?);
        data.add_uint16(tx.fee_token_id);
        data.add_uint16(FLOAT16.encode(tx.fee)? as u16);
        data.add_uint32(tx.storage_id);
        data.add_address(tx.to);
        self.push_slot(data);
        Ok(self)
    }

    fn encode_order(data: &mut TxData, order: &Order) -> Result<(), CodecError> {
        data.add_uint32(order.storage_id);
        data.add_uint32(order.account_id);
        data.add_uint16(order.token_s);
        data.add_uint16(order.token_b);
        data.add_uint24(FLOAT24.encode(order.fill_s)?);
        let mut flags = order.fee_bips & 0x3f;
        if order.rebate {
            flags |= 0x80;
        }
        if order.overwrite {
            flags |= 0x40;
        }
        data.add_uint8(flags);
        Ok(())
    }

    pub fn add_spot_trade(&mut self, tx: &SpotTradeTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::SPOT_TRADE);
        Self::encode_order(&mut data, &tx.order_a)?;
        Self::encode_order(&mut data, &tx.order_b)?;
        self.push_slot(data);
        Ok(self)
    }

    pub fn add_account_update(&mut self, tx: &AccountUpdateTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::ACCOUNT_UPDATE);
        data.add_uint8(tx.update_type);
        data.add_uint32(tx.account_id);
        data.add_uint16(tx.fee_token_id);
        data.add_uint16(FLOAT16.encode(tx.fee)? as u16);
        data.add_hash(tx.pub_key_x);
        data.add_hash(tx.pub_key_y);
        data.add_hash(tx.wallet_hash);
        self.push_slot(data);
        Ok(self)
    }

    pub fn add_amm_update(&mut self, tx: &AmmUpdateTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::AMM_UPDATE);
        data.add_address(tx.owner);
        data.add_uint32(tx.account_id);
        data.add_uint16(tx.token_id);
        data.add_uint8(tx.fee_bips);
        data.add_uint96(tx.token_weight)?;
        self.push_slot(data);
        Ok(self)
    }

    pub fn add_signature_verification(&mut self, tx: &SignatureVerificationTx) -> &mut Self {
        let mut data = TxData::new();
        data.add_uint8(tag::SIGNATURE_VERIFICATION);
        data.add_uint32(tx.account_id);
        data.add_hash(tx.data_hash);
        self.push_slot(data);
        self
    }

    /// Appends the mint slot plus its aux carrier slot(s).
    pub fn add_nft_mint(&mut self, tx: &NftMintTx) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::NFT_MINT);
        data.add_uint8(tx.mint_type);
        data.add_uint32(tx.minter_account_id);
        data.add_uint32(tx.to_account_id);
        data.add_uint16(tx.to_token_id);
        data.add_uint24(FLOAT24.encode(tx.amount)?);
        data.add_uint16(tx.fee_token_id);
        data.add_uint16(FLOAT16.encode(tx.fee)? as u16);
        data.add_uint32(tx.storage_id);
        data.add_address(tx.to);
        self.push_slot(data);

        match &tx.data {
            NftMintData::Descriptor {
                minter,
                nft_type,
                token_address,
                creator_fee_bips,
                nft_id,
            } => {
                let mut carrier = TxData::new();
                carrier.add_uint8(tag::NFT_DATA);
                carrier.add_address(*minter);
                carrier.add_uint8(*nft_type);
                carrier.add_address(*token_address);
                carrier.add_uint8(*creator_fee_bips);
                self.push_slot(carrier);

                let mut carrier = TxData::new();
                carrier.add_uint8(tag::NFT_DATA);
                carrier.add_hash(*nft_id);
                self.push_slot(carrier);
            }
            NftMintData::Hash(hash) => {
                let mut carrier = TxData::new();
                carrier.add_uint8(tag::NFT_DATA);
                carrier.add_hash(*hash);
                self.push_slot(carrier);
            }
        }
        Ok(self)
    }

    pub fn add_order_cancellation(
        &mut self,
        tx: &OrderCancellationTx,
    ) -> Result<&mut Self, CodecError> {
        let mut data = TxData::new();
        data.add_uint8(tag::ORDER_CANCELLATION);
        data.add_uint32(tx.account_id);
        data.add_uint16(tx.token_id);
        data.add_uint32(tx.storage_id);
        data.add_uint16(tx.fee_token_id);
        data.add_uint16(FLOAT16.encode(tx.fee)? as u16);
        self.push_slot(data);
        Ok(self)
    }

    /// Pack the header and the two slot regions into a block record.
    pub fn build(&self) -> BlockRecord {
        let mut data = TxData::new();
        data.add_address(self.exchange);
        data.add_hash(self.merkle_root_before);
        data.add_hash(self.merkle_root_after);
        data.add_uint32(self.num_conditional_txs);
        data.add_uint8(self.protocol_taker_fee_bips);
        data.add_uint8(self.protocol_maker_fee_bips);
        data.add_uint32(self.operator_account_id);

        for slot in &self.slots {
            data.add_bytes(&slot.as_bytes()[..TX_DATA_SIZE_PART_1]);
        }
        for slot in &self.slots {
            data.add_bytes(&slot.as_bytes()[TX_DATA_SIZE_PART_1..]);
        }

        BlockRecord {
            block_type: 0,
            block_size: self.slots.len() as u16,
            block_version: 0,
            data: data.into_bytes(),
            auxiliary_data: Vec::new(),
            offchain_data: Vec::new(),
        }
    }
}
