//! Committed submission calldata
//!
//! A `submitBlocks` transaction carries a one-byte compression mode
//! followed by a list of block records. Structurally broken submissions
//! and records that do not belong to the tracked exchange are skipped with
//! a warning; they were never accepted for this exchange, so skipping them
//! cannot diverge the ledger.

use crate::compression::{compress_zeros, decompress_zeros, DecompressError};
use block_replicator::BlockRecord;
use primitive_types::{H160, U256};
use rollup_codec::{CodecError, TxData};
use thiserror::Error;
use tracing::warn;

/// Minimum payload length: exchange address plus the two roots.
const MIN_BLOCK_DATA_LEN: usize = 20 + 32 + 32;
const PROOF_WORDS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    Identity,
    ZeroRunLength,
}

impl CompressionMode {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionMode::Identity),
            1 => Some(CompressionMode::ZeroRunLength),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        match self {
            CompressionMode::Identity => 0,
            CompressionMode::ZeroRunLength => 1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalldataError {
    #[error("empty submission calldata")]
    Empty,

    #[error("unknown compression mode {mode}")]
    UnknownCompression { mode: u8 },

    #[error(transparent)]
    Decompress(#[from] DecompressError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn read_prefixed(data: &TxData, offset: &mut usize) -> Result<Vec<u8>, CodecError> {
    let len = data.extract_uint32(*offset)? as usize;
    let bytes = data.extract_bytes(*offset + 4, len)?.to_vec();
    *offset += 4 + len;
    Ok(bytes)
}

/// Decode one submission into the block records addressed to `exchange`.
/// Records for other exchanges or with impossible payloads are skipped.
pub fn decode_submission(
    calldata: &[u8],
    exchange: H160,
) -> Result<Vec<BlockRecord>, CalldataError> {
    let (&mode_tag, body) = calldata.split_first().ok_or(CalldataError::Empty)?;
    let mode =
        CompressionMode::from_tag(mode_tag).ok_or(CalldataError::UnknownCompression {
            mode: mode_tag,
        })?;
    let body = match mode {
        CompressionMode::Identity => body.to_vec(),
        CompressionMode::ZeroRunLength => decompress_zeros(body)?,
    };
    let data = TxData::from_bytes(body);

    let mut records = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let block_type = data.extract_uint8(offset)?;
        let block_size = data.extract_uint16(offset + 1)?;
        let block_version = data.extract_uint8(offset + 3)?;
        offset += 4;
        let block_data = read_prefixed(&data, &mut offset)?;
        // The validity proof is checked on chain; replication only steps
        // over its words.
        data.extract_bytes(offset, PROOF_WORDS * 32)?;
        offset += PROOF_WORDS * 32;
        let _store_data_hash_onchain = data.extract_uint8(offset)? != 0;
        offset += 1;
        let auxiliary_data = read_prefixed(&data, &mut offset)?;
        let offchain_data = read_prefixed(&data, &mut offset)?;

        if block_data.len() < MIN_BLOCK_DATA_LEN {
            warn!(
                len = block_data.len(),
                "skipping block record with truncated payload"
            );
            continue;
        }
        let record_exchange = TxData::from_bytes(block_data.clone()).extract_address(0)?;
        if record_exchange != exchange {
            warn!(?record_exchange, "skipping block record for another exchange");
            continue;
        }

        records.push(BlockRecord {
            block_type,
            block_size,
            block_version,
            data: block_data,
            auxiliary_data,
            offchain_data,
        });
    }
    Ok(records)
}

/// Encode block records into submission calldata, the inverse of
/// [`decode_submission`]. Proof words are zero; the replica never produces
/// real proofs.
pub fn encode_submission(records: &[BlockRecord], mode: CompressionMode) -> Vec<u8> {
    let mut body = TxData::new();
    for record in records {
        body.add_uint8(record.block_type);
        body.add_uint16(record.block_size);
        body.add_uint8(record.block_version);
        body.add_uint32(record.data.len() as u32);
        body.add_bytes(&record.data);
        for _ in 0..PROOF_WORDS {
            body.add_uint256(U256::zero());
        }
        body.add_uint8(0);
        body.add_uint32(record.auxiliary_data.len() as u32);
        body.add_bytes(&record.auxiliary_data);
        body.add_uint32(record.offchain_data.len() as u32);
        body.add_bytes(&record.offchain_data);
    }

    let mut out = vec![mode.tag()];
    match mode {
        CompressionMode::Identity => out.extend_from_slice(body.as_bytes()),
        CompressionMode::ZeroRunLength => out.extend_from_slice(&compress_zeros(body.as_bytes())),
    }
    out
}
