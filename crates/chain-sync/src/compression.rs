//! Zero run-length calldata compression
//!
//! Block payloads are mostly zero padding, so submissions may be committed
//! with a simple run-length coding of zero bytes: `0x00` is an escape
//! followed by a run length in `1..=255`; every other byte is literal.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    #[error("zero escape at offset {offset} has no run length")]
    TruncatedRun { offset: usize },

    #[error("zero run of length 0 at offset {offset}")]
    EmptyRun { offset: usize },
}

/// Expand zero runs back into literal zero bytes.
pub fn decompress_zeros(input: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    while pos < input.len() {
        let byte = input[pos];
        if byte == 0x00 {
            let run = *input
                .get(pos + 1)
                .ok_or(DecompressError::TruncatedRun { offset: pos })?;
            if run == 0 {
                return Err(DecompressError::EmptyRun { offset: pos + 1 });
            }
            out.resize(out.len() + run as usize, 0);
            pos += 2;
        } else {
            out.push(byte);
            pos += 1;
        }
    }
    Ok(out)
}

/// Encode zero runs; literal bytes pass through.
pub fn compress_zeros(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    while pos < input.len() {
        if input[pos] == 0x00 {
            let mut run = 1usize;
            while pos + run < input.len() && input[pos + run] == 0x00 && run < 255 {
                run += 1;
            }
            out.push(0x00);
            out.push(run as u8);
            pos += run;
        } else {
            out.push(input[pos]);
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = [
            vec![1, 2, 3],
            vec![0, 0, 0, 0, 7],
            vec![7, 0, 8],
            vec![0; 1000],
            Vec::new(),
        ];
        for input in data {
            let packed = compress_zeros(&input);
            assert_eq!(decompress_zeros(&packed).unwrap(), input);
        }
    }

    #[test]
    fn test_long_runs_split_at_255() {
        let input = vec![0u8; 300];
        let packed = compress_zeros(&input);
        assert_eq!(packed, vec![0, 255, 0, 45]);
    }

    #[test]
    fn test_truncated_escape() {
        let err = decompress_zeros(&[5, 0]).unwrap_err();
        assert_eq!(err, DecompressError::TruncatedRun { offset: 1 });
    }

    #[test]
    fn test_zero_length_run() {
        let err = decompress_zeros(&[0, 0]).unwrap_err();
        assert_eq!(err, DecompressError::EmptyRun { offset: 1 });
    }
}
