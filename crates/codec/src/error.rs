//! Codec Errors

use primitive_types::U256;
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated buffer: {needed} bytes at offset {offset} exceed buffer of {available}")]
    StructuralDecode {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("value {value} does not fit in {width} bytes")]
    Encoding { value: U256, width: usize },

    #[error("amount {value} exceeds the float exponent range")]
    FloatOverflow { value: U256 },
}
