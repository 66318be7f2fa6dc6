//! Rollup payload codec
//!
//! This crate provides the byte-level plumbing for committed block payloads:
//! - Fixed-width big-endian field extraction/insertion at absolute offsets
//! - The compact (exponent, mantissa) float encoding used for amounts

pub mod buffer;
pub mod error;
pub mod float;

pub use buffer::TxData;
pub use error::CodecError;
pub use float::{FloatEncoding, FLOAT16, FLOAT24};
