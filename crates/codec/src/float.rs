//! Compact (exponent, mantissa) amount encoding
//!
//! On-chain amount fields are shrunk to a few bytes by storing
//! `mantissa * base^exponent`. Decoding is bit-exact and deterministic;
//! it is the only direction used during state replication. Encoding picks
//! the most precise representation and is allowed to lose low digits for
//! amounts that are not exactly representable.

use crate::error::CodecError;
use primitive_types::U256;

/// Parameters of a fixed-point float encoding.
///
/// The total width `num_bits_exponent + num_bits_mantissa` must not exceed
/// 32 bits; both standard encodings are well below that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloatEncoding {
    pub num_bits_exponent: u32,
    pub num_bits_mantissa: u32,
    pub exponent_base: u32,
}

/// 16-bit encoding used for fee amounts: 5-bit exponent, 11-bit mantissa.
pub const FLOAT16: FloatEncoding = FloatEncoding {
    num_bits_exponent: 5,
    num_bits_mantissa: 11,
    exponent_base: 10,
};

/// 24-bit encoding used for fill/transfer amounts: 5-bit exponent, 19-bit mantissa.
pub const FLOAT24: FloatEncoding = FloatEncoding {
    num_bits_exponent: 5,
    num_bits_mantissa: 19,
    exponent_base: 10,
};

impl FloatEncoding {
    /// Width of the encoded field in bytes.
    pub fn num_bytes(&self) -> usize {
        ((self.num_bits_exponent + self.num_bits_mantissa) / 8) as usize
    }

    fn max_mantissa(&self) -> u32 {
        (1u32 << self.num_bits_mantissa) - 1
    }

    fn max_exponent(&self) -> u32 {
        (1u32 << self.num_bits_exponent) - 1
    }

    /// Decode a bit pattern into `mantissa * base^exponent`.
    ///
    /// Pure function: the same bits always yield the same integer, and
    /// `decode(0) == 0`.
    pub fn decode(&self, bits: u32) -> U256 {
        let exponent = bits >> self.num_bits_mantissa;
        let mantissa = bits & self.max_mantissa();
        U256::from(mantissa) * U256::from(self.exponent_base).pow(U256::from(exponent))
    }

    /// Encode a value, choosing the smallest exponent whose floored
    /// mantissa fits the mantissa width.
    ///
    /// Amounts that are not exactly representable lose their low digits;
    /// `decode(encode(v)) <= v` always holds.
    pub fn encode(&self, value: U256) -> Result<u32, CodecError> {
        if value.is_zero() {
            return Ok(0);
        }
        let base = U256::from(self.exponent_base);
        let max_mantissa = U256::from(self.max_mantissa());

        let mut exponent = 0u32;
        let mut mantissa = value;
        while mantissa > max_mantissa {
            if exponent == self.max_exponent() {
                return Err(CodecError::FloatOverflow { value });
            }
            mantissa /= base;
            exponent += 1;
        }
        Ok((exponent << self.num_bits_mantissa) | mantissa.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_zero_is_zero() {
        assert_eq!(FLOAT16.decode(0), U256::zero());
        assert_eq!(FLOAT24.decode(0), U256::zero());
    }

    #[test]
    fn test_decode_is_pure() {
        let bits = (3 << FLOAT24.num_bits_mantissa) | 12_345;
        assert_eq!(FLOAT24.decode(bits), FLOAT24.decode(bits));
        assert_eq!(FLOAT24.decode(bits), U256::from(12_345u64 * 1000));
    }

    #[test]
    fn test_decode_known_values() {
        // exponent 0: mantissa verbatim
        assert_eq!(FLOAT16.decode(1000), U256::from(1000u64));
        // exponent 2, mantissa 1: 1 * 10^2
        let bits = (2 << FLOAT16.num_bits_mantissa) | 1;
        assert_eq!(FLOAT16.decode(bits), U256::from(100u64));
    }

    #[test]
    fn test_encode_exact_round_trips() {
        for value in [0u64, 1, 999, 2047, 1000, 20_470_000] {
            let bits = FLOAT16.encode(U256::from(value)).unwrap();
            assert_eq!(FLOAT16.decode(bits), U256::from(value));
        }
    }

    #[test]
    fn test_encode_floors_unrepresentable_amounts() {
        // 2048 does not fit an 11-bit mantissa; one base-10 digit is lost.
        let bits = FLOAT16.encode(U256::from(2049u64)).unwrap();
        assert_eq!(FLOAT16.decode(bits), U256::from(2040u64));
        assert!(FLOAT16.decode(bits) <= U256::from(2049u64));
    }

    #[test]
    fn test_encode_overflow() {
        // 2047 * 10^31 is the largest representable float16 value.
        let max = U256::from(2047u64) * U256::from(10u64).pow(U256::from(31u64));
        assert!(FLOAT16.encode(max).is_ok());
        let err = FLOAT16.encode(max + U256::from(10u64).pow(U256::from(31u64)));
        assert!(matches!(err, Err(CodecError::FloatOverflow { .. })));
    }

    #[test]
    fn test_field_widths() {
        assert_eq!(FLOAT16.num_bytes(), 2);
        assert_eq!(FLOAT24.num_bytes(), 3);
    }
}
