//! Big-endian (network order) encoding of fixed-width values.

use crate::error::{RecordError, Result};

/// Encode a `u32` in network byte order.
pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Decode a network-order `u32` from the first 4 bytes of `src`.
pub fn decode_u32(src: &[u8]) -> Result<u32> {
    Ok(u32::from_be_bytes(leading::<4>(src)?))
}

/// Encode an `f64` as its IEEE-754 bit pattern in network byte order.
pub fn encode_f64(value: f64) -> [u8; 8] {
    value.to_bits().to_be_bytes()
}

/// Decode a network-order `f64` from the first 8 bytes of `src`.
pub fn decode_f64(src: &[u8]) -> Result<f64> {
    Ok(f64::from_bits(u64::from_be_bytes(leading::<8>(src)?)))
}

fn leading<const N: usize>(src: &[u8]) -> Result<[u8; N]> {
    src.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(RecordError::TruncatedInput {
            needed: N,
            available: src.len(),
        })
}
