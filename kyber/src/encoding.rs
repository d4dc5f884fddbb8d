use serde::{Deserialize, Serialize};

/// Byte order used by a fixed-width integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Most significant byte first.
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    /// Index of the most significant byte in a buffer of `len` bytes.
    pub fn msb_index(self, len: usize) -> usize {
        match self {
            ByteOrder::BigEndian => 0,
            ByteOrder::LittleEndian => len.saturating_sub(1),
        }
    }
}

/// Errors raised by the fixed-width decoders of scalars, elements and modular integers.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum EncodingError {
    /// invalid length: expected {expected} bytes, got {actual}
    InvalidLength {
        /// Expected number of bytes
        expected: usize,
        /// Number of bytes provided
        actual: usize,
    },
    /// decoded value is not below the modulus
    OutOfRange,
    /// bytes do not describe a point on the curve
    NotOnCurve,
    /// point is not in the prime-order subgroup
    NotInSubgroup,
    /// embedded data length {0} exceeds the embedding capacity
    EmbeddedLength(usize),
    /// value does not fit in the wire width
    Overflow,
    /// canonical encoding check failed
    NonCanonical,
}

/// Checks that `bytes` has exactly `expected` bytes.
pub fn check_len(bytes: &[u8], expected: usize) -> Result<(), EncodingError> {
    if bytes.len() != expected {
        return Err(EncodingError::InvalidLength { expected, actual: bytes.len() });
    }
    Ok(())
}

/// Left pads a big-endian byte string with zeros up to `len` bytes.
///
/// Returns [`EncodingError::Overflow`] when `bytes` is already longer than `len`.
pub fn pad_be(bytes: &[u8], len: usize) -> Result<Vec<u8>, EncodingError> {
    if bytes.len() > len {
        return Err(EncodingError::Overflow);
    }
    let mut out = vec![0u8; len];
    out[len - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}
