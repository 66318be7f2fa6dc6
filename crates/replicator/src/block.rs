//! Block replay
//!
//! Takes one committed block record, decodes its transaction table slot by
//! slot, applies every transaction to the ledger and verifies that the
//! recomputed root equals the committed `merkleRootAfter`.

use crate::error::ReplayError;
use crate::processor::{self, TxContext};
use crate::wire::{self, tag, TX_DATA_SIZE_PART_1, TX_DATA_SIZE_PART_2};
use exchange_state::{Block, ExchangeState, NftDataTx, NftMintData, NftMintTx, Transaction};
use primitive_types::{H160, U256};
use rollup_codec::TxData;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Payload offset of the packed transaction table; the bytes before it are
/// the block header.
pub const TX_TABLE_OFFSET: usize = 94;

const OFFSET_EXCHANGE: usize = 0;
const OFFSET_ROOT_BEFORE: usize = 20;
const OFFSET_ROOT_AFTER: usize = 52;
const OFFSET_NUM_CONDITIONAL: usize = 84;
const OFFSET_TAKER_FEE_BIPS: usize = 88;
const OFFSET_MAKER_FEE_BIPS: usize = 89;
const OFFSET_OPERATOR_ACCOUNT: usize = 90;

/// One block as committed on chain, after calldata decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block_type: u8,
    pub block_size: u16,
    pub block_version: u8,
    pub data: Vec<u8>,
    pub auxiliary_data: Vec<u8>,
    pub offchain_data: Vec<u8>,
}

/// Submission context from the `BlockSubmitted` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub block_idx: u64,
    pub timestamp: u64,
    pub operator: H160,
    pub origin: H160,
}

/// Applies committed blocks to an exchange ledger.
pub struct BlockReplicator<'a> {
    state: &'a mut ExchangeState,
}

impl<'a> BlockReplicator<'a> {
    pub fn new(state: &'a mut ExchangeState) -> Self {
        Self { state }
    }

    /// Reassemble slot `index` from the two payload regions.
    fn slot_data(
        payload: &TxData,
        block_size: usize,
        index: usize,
    ) -> Result<TxData, ReplayError> {
        let part_1_offset = TX_TABLE_OFFSET + index * TX_DATA_SIZE_PART_1;
        let part_2_offset =
            TX_TABLE_OFFSET + block_size * TX_DATA_SIZE_PART_1 + index * TX_DATA_SIZE_PART_2;
        let mut bytes = Vec::with_capacity(TX_DATA_SIZE_PART_1 + TX_DATA_SIZE_PART_2);
        bytes.extend_from_slice(payload.extract_bytes(part_1_offset, TX_DATA_SIZE_PART_1)?);
        bytes.extend_from_slice(payload.extract_bytes(part_2_offset, TX_DATA_SIZE_PART_2)?);
        Ok(TxData::from_bytes(bytes))
    }

    /// Replay one committed block. Any error other than a skipped-calldata
    /// condition upstream is fatal to replication.
    pub fn replicate(
        &mut self,
        record: &BlockRecord,
        ctx: &BlockContext,
    ) -> Result<(), ReplayError> {
        let payload = TxData::from_bytes(record.data.clone());
        let exchange = payload.extract_address(OFFSET_EXCHANGE)?;
        let root_before = payload.extract_hash(OFFSET_ROOT_BEFORE)?;
        let root_after = payload.extract_hash(OFFSET_ROOT_AFTER)?;
        let num_conditional_txs = payload.extract_uint32(OFFSET_NUM_CONDITIONAL)?;
        let taker_fee_bips = payload.extract_uint8(OFFSET_TAKER_FEE_BIPS)?;
        let maker_fee_bips = payload.extract_uint8(OFFSET_MAKER_FEE_BIPS)?;
        let operator_account_id = payload.extract_uint32(OFFSET_OPERATOR_ACCOUNT)?;

        if ctx.block_idx != self.state.num_blocks() {
            return Err(exchange_state::StateError::UnexpectedIndex {
                kind: "block",
                expected: self.state.num_blocks(),
                actual: ctx.block_idx,
            }
            .into());
        }
        if root_before != self.state.root() {
            return Err(ReplayError::StateDivergence {
                expected: root_before,
                actual: self.state.root(),
            });
        }
        debug!(
            block_idx = ctx.block_idx,
            ?exchange,
            block_size = record.block_size,
            "replaying block"
        );

        let block_size = record.block_size as usize;
        let tx_ctx = TxContext {
            block_idx: ctx.block_idx,
            operator_account_id,
            protocol_taker_fee_bips: taker_fee_bips,
            protocol_maker_fee_bips: maker_fee_bips,
        };
        let base_request_idx = self.state.total_requests_processed();
        let mut requests: Vec<Transaction> = Vec::with_capacity(block_size);

        let mut slot = 0;
        while slot < block_size {
            let tx_data = Self::slot_data(&payload, block_size, slot)?;
            let tx_tag = tx_data.extract_uint8(0)?;
            let request_idx = base_request_idx + slot as u64;

            match tx_tag {
                tag::NOOP => requests.push(Transaction::Noop),
                tag::DEPOSIT => {
                    let tx = wire::decode_deposit(&tx_data)?;
                    processor::process_deposit(self.state, &tx, &tx_ctx, request_idx)?;
                    requests.push(Transaction::Deposit(tx));
                }
                tag::WITHDRAWAL => {
                    let tx = wire::decode_withdrawal(&tx_data)?;
                    processor::process_withdrawal(self.state, &tx, &tx_ctx, request_idx)?;
                    requests.push(Transaction::Withdrawal(tx));
                }
                tag::TRANSFER => {
                    let tx = wire::decode_transfer(&tx_data)?;
                    processor::process_transfer(self.state, &tx, &tx_ctx)?;
                    requests.push(Transaction::Transfer(tx));
                }
                tag::SPOT_TRADE => {
                    let tx = wire::decode_spot_trade(&tx_data)?;
                    processor::process_spot_trade(self.state, &tx, &tx_ctx)?;
                    requests.push(Transaction::SpotTrade(tx));
                }
                tag::ACCOUNT_UPDATE => {
                    let tx = wire::decode_account_update(&tx_data)?;
                    processor::process_account_update(self.state, &tx, &tx_ctx)?;
                    requests.push(Transaction::AccountUpdate(tx));
                }
                tag::AMM_UPDATE => {
                    let tx = wire::decode_amm_update(&tx_data)?;
                    processor::process_amm_update(self.state, &tx)?;
                    requests.push(Transaction::AmmUpdate(tx));
                }
                tag::SIGNATURE_VERIFICATION => {
                    let tx = wire::decode_signature_verification(&tx_data)?;
                    requests.push(Transaction::SignatureVerification(tx));
                }
                tag::NFT_MINT => {
                    let header = wire::decode_nft_mint(&tx_data)?;
                    let num_carriers = match header.mint_type {
                        0 | 1 => 2,
                        2 => 1,
                        _ => return Err(ReplayError::InvalidAuxSlot { slot }),
                    };
                    if slot + num_carriers >= block_size {
                        return Err(ReplayError::InvalidAuxSlot { slot });
                    }
                    let mut carriers = Vec::with_capacity(num_carriers);
                    for i in 1..=num_carriers {
                        let carrier = Self::slot_data(&payload, block_size, slot + i)?;
                        if carrier.extract_uint8(0)? != tag::NFT_DATA {
                            return Err(ReplayError::InvalidAuxSlot { slot: slot + i });
                        }
                        carriers.push(carrier);
                    }
                    let data = match header.mint_type {
                        2 => NftMintData::Hash(wire::decode_mint_hash(&carriers[0])?),
                        _ => wire::decode_mint_descriptor(&carriers[0], &carriers[1])?,
                    };
                    let tx = NftMintTx {
                        mint_type: header.mint_type,
                        minter_account_id: header.minter_account_id,
                        to_account_id: header.to_account_id,
                        to_token_id: header.to_token_id,
                        amount: header.amount,
                        fee_token_id: header.fee_token_id,
                        fee: header.fee,
                        storage_id: header.storage_id,
                        to: header.to,
                        data,
                    };
                    processor::process_nft_mint(self.state, &tx, &tx_ctx)?;
                    requests.push(Transaction::NftMint(tx));
                    for carrier in &carriers {
                        requests.push(Transaction::NftData(NftDataTx {
                            payload: carrier.as_bytes()[1..].to_vec(),
                        }));
                    }
                    slot += 1 + num_carriers;
                    continue;
                }
                tag::NFT_DATA => {
                    // Standalone data slot, not consumed by a mint.
                    requests.push(Transaction::NftData(NftDataTx {
                        payload: tx_data.as_bytes()[1..].to_vec(),
                    }));
                }
                tag::ORDER_CANCELLATION => {
                    let tx = wire::decode_order_cancellation(&tx_data)?;
                    processor::process_order_cancellation(self.state, &tx, &tx_ctx)?;
                    requests.push(Transaction::OrderCancellation(tx));
                }
                other => {
                    return Err(ReplayError::UnknownTransactionType {
                        tag: other,
                        slot,
                    })
                }
            }
            slot += 1;
        }

        // The operator signs the block; its nonce advances once per block.
        self.state
            .get_or_create_account(operator_account_id)?
            .nonce += 1;

        let new_root = self.state.commit_trees().map_err(ReplayError::State)?;
        if new_root != root_after {
            return Err(ReplayError::StateDivergence {
                expected: root_after,
                actual: new_root,
            });
        }

        let num_requests = requests.len() as u64;
        self.state.append_block(
            Block {
                block_idx: ctx.block_idx,
                block_type: record.block_type,
                block_size: record.block_size,
                block_version: record.block_version,
                data: record.data.clone(),
                operator: ctx.operator,
                origin: ctx.origin,
                block_fee: U256::zero(),
                merkle_root: new_root,
                timestamp: ctx.timestamp,
                num_conditional_txs,
                operator_account_id,
                num_requests_processed: num_requests,
                total_num_requests_processed: base_request_idx + num_requests,
            },
            requests,
        )?;
        info!(
            block_idx = ctx.block_idx,
            block_size = record.block_size,
            root = ?new_root,
            "block replicated"
        );
        Ok(())
    }
}
