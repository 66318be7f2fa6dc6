//! Fixed-width big-endian field access over a byte buffer
//!
//! `TxData` keeps no internal cursor: callers address fields by absolute
//! byte offset, which lets the block replicator read the two disjoint
//! regions of a transaction slot through one view.

use crate::error::CodecError;
use primitive_types::{H160, H256, U256};

/// Byte buffer with absolute-offset field extraction and append-only insertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxData {
    bytes: Vec<u8>,
}

impl TxData {
    /// Create an empty buffer (builder side).
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Wrap an existing payload (decoder side).
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Bounds-checked view of `len` bytes at `offset`.
    fn range(&self, offset: usize, len: usize) -> Result<&[u8], CodecError> {
        let end = offset
            .checked_add(len)
            .ok_or(CodecError::StructuralDecode {
                offset,
                needed: len,
                available: self.bytes.len(),
            })?;
        if end > self.bytes.len() {
            return Err(CodecError::StructuralDecode {
                offset,
                needed: len,
                available: self.bytes.len(),
            });
        }
        Ok(&self.bytes[offset..end])
    }

    pub fn extract_bytes(&self, offset: usize, len: usize) -> Result<&[u8], CodecError> {
        self.range(offset, len)
    }

    pub fn extract_uint8(&self, offset: usize) -> Result<u8, CodecError> {
        Ok(self.range(offset, 1)?[0])
    }

    pub fn extract_uint16(&self, offset: usize) -> Result<u16, CodecError> {
        let b = self.range(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// 3-byte big-endian field, the width of a FLOAT24 amount.
    pub fn extract_uint24(&self, offset: usize) -> Result<u32, CodecError> {
        let b = self.range(offset, 3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn extract_uint32(&self, offset: usize) -> Result<u32, CodecError> {
        let b = self.range(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn extract_uint64(&self, offset: usize) -> Result<u64, CodecError> {
        let b = self.range(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    /// 12-byte (96-bit) big-endian unsigned integer, the width used for
    /// on-chain amounts.
    pub fn extract_uint96(&self, offset: usize) -> Result<U256, CodecError> {
        Ok(U256::from_big_endian(self.range(offset, 12)?))
    }

    pub fn extract_uint256(&self, offset: usize) -> Result<U256, CodecError> {
        Ok(U256::from_big_endian(self.range(offset, 32)?))
    }

    pub fn extract_address(&self, offset: usize) -> Result<H160, CodecError> {
        Ok(H160::from_slice(self.range(offset, 20)?))
    }

    pub fn extract_hash(&self, offset: usize) -> Result<H256, CodecError> {
        Ok(H256::from_slice(self.range(offset, 32)?))
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn add_uint8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn add_uint16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn add_uint24(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes()[1..]);
    }

    pub fn add_uint32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn add_uint64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    /// Append `value` left-padded to `width` bytes, big-endian.
    ///
    /// Fails when the value needs more than `width` bytes.
    pub fn add_number(&mut self, value: U256, width: usize) -> Result<(), CodecError> {
        if width > 32 || (width < 32 && value >= (U256::one() << (8 * width))) {
            return Err(CodecError::Encoding { value, width });
        }
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        self.bytes.extend_from_slice(&buf[32 - width..]);
        Ok(())
    }

    pub fn add_uint96(&mut self, value: U256) -> Result<(), CodecError> {
        self.add_number(value, 12)
    }

    pub fn add_uint256(&mut self, value: U256) {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn add_address(&mut self, value: H160) {
        self.bytes.extend_from_slice(value.as_bytes());
    }

    pub fn add_hash(&mut self, value: H256) {
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// Zero-pad the buffer up to `len` bytes. Used by block builders to
    /// bring a transaction slot to its fixed stride.
    pub fn pad_to(&mut self, len: usize) {
        if self.bytes.len() < len {
            self.bytes.resize(len, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_big_endian_fields() {
        let data = TxData::from_bytes(vec![
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a,
        ]);

        assert_eq!(data.extract_uint8(0).unwrap(), 0x01);
        assert_eq!(data.extract_uint16(0).unwrap(), 0x0102);
        assert_eq!(data.extract_uint32(2).unwrap(), 0x0304_0506);
        assert_eq!(data.extract_uint64(1).unwrap(), 0x0203_0405_0607_0809);
        assert_eq!(data.extract_bytes(8, 2).unwrap(), &[0x09, 0x0a]);
    }

    #[test]
    fn test_extract_past_end_is_structural_error() {
        let data = TxData::from_bytes(vec![0u8; 4]);
        let err = data.extract_uint32(1).unwrap_err();
        assert_eq!(
            err,
            CodecError::StructuralDecode {
                offset: 1,
                needed: 4,
                available: 4,
            }
        );
    }

    #[test]
    fn test_add_then_extract_round_trip() {
        let mut data = TxData::new();
        data.add_uint8(0x7f);
        data.add_uint16(0xbeef);
        data.add_uint32(0xdead_beef);
        let addr = H160::repeat_byte(0x11);
        data.add_address(addr);
        data.add_uint96(U256::from(123_456_789u64)).unwrap();

        assert_eq!(data.extract_uint8(0).unwrap(), 0x7f);
        assert_eq!(data.extract_uint16(1).unwrap(), 0xbeef);
        assert_eq!(data.extract_uint32(3).unwrap(), 0xdead_beef);
        assert_eq!(data.extract_address(7).unwrap(), addr);
        assert_eq!(
            data.extract_uint96(27).unwrap(),
            U256::from(123_456_789u64)
        );
        assert_eq!(data.len(), 39);
    }

    #[test]
    fn test_add_number_left_pads() {
        let mut data = TxData::new();
        data.add_number(U256::from(0xabcdu64), 4).unwrap();
        assert_eq!(data.as_bytes(), &[0x00, 0x00, 0xab, 0xcd]);
    }

    #[test]
    fn test_add_number_rejects_oversized_value() {
        let mut data = TxData::new();
        let err = data.add_number(U256::from(0x1_0000u64), 2).unwrap_err();
        assert!(matches!(err, CodecError::Encoding { width: 2, .. }));
    }

    #[test]
    fn test_pad_to_fixed_stride() {
        let mut data = TxData::new();
        data.add_uint16(7);
        data.pad_to(8);
        assert_eq!(data.len(), 8);
        assert_eq!(data.extract_uint64(0).unwrap(), 0x0007_0000_0000_0000);
    }
}
