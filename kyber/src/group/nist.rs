//! NIST prime curves backed by the RustCrypto `p256`, `p384` and `p521` crates.
//!
//! Elements are encoded as uncompressed SEC1 points (`0x04 ‖ x ‖ y`); the identity, which has no
//! affine coordinates, is the all-zero string of the same length. Scalars are big-endian.
//! Data is embedded into the big-endian x coordinate: its last byte holds the payload length
//! and the payload sits right before it, after a random prefix.

use core::fmt;

use p256::elliptic_curve::{
    ff::{Field, PrimeField},
    group::Group as _,
    sec1::{FromEncodedPoint, ToEncodedPoint},
};
use rand_core::{CryptoRng, RngCore};

use super::{Element, Group, Scalar};
use crate::encoding::{check_len, ByteOrder, EncodingError};

macro_rules! nist_curve {
    (
        $(#[$meta:meta])*
        $group:ident, $scalar:ident, $point:ident, $krate:ident,
        name = $name:literal, field_len = $field_len:expr, field_bits = $field_bits:expr, order_bits = $order_bits:expr $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $group;

        #[doc = concat!("Scalar modulo the ", $name, " group order.")]
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub struct $scalar($krate::Scalar);

        impl fmt::Debug for $scalar {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($scalar), hex::encode(self.0.to_repr()))
            }
        }

        impl zeroize::Zeroize for $scalar {
            fn zeroize(&mut self) {
                self.0 = $krate::Scalar::ZERO;
            }
        }

        impl Scalar for $scalar {
            fn add(&self, rhs: &Self) -> Self {
                Self(self.0 + rhs.0)
            }

            fn sub(&self, rhs: &Self) -> Self {
                Self(self.0 - rhs.0)
            }

            fn neg(&self) -> Self {
                Self(-self.0)
            }

            fn mul(&self, rhs: &Self) -> Self {
                Self(self.0 * rhs.0)
            }

            fn inv(&self) -> Option<Self> {
                Option::<$krate::Scalar>::from(self.0.invert()).map(Self)
            }

            fn is_zero(&self) -> bool {
                bool::from(self.0.is_zero())
            }

            fn to_bytes(&self) -> Vec<u8> {
                self.0.to_repr().to_vec()
            }
        }

        #[doc = concat!("A point of ", $name, ".")]
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub struct $point($krate::ProjectivePoint);

        impl fmt::Debug for $point {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($point), hex::encode(self.to_bytes()))
            }
        }

        impl Element for $point {
            type Scalar = $scalar;

            fn add(&self, rhs: &Self) -> Self {
                Self(self.0 + rhs.0)
            }

            fn sub(&self, rhs: &Self) -> Self {
                Self(self.0 - rhs.0)
            }

            fn neg(&self) -> Self {
                Self(-self.0)
            }

            fn mul(&self, s: &$scalar) -> Self {
                Self(self.0 * s.0)
            }

            fn is_identity(&self) -> bool {
                bool::from(self.0.is_identity())
            }

            fn to_bytes(&self) -> Vec<u8> {
                if self.is_identity() {
                    return vec![0u8; 1 + 2 * $field_len];
                }
                self.0.to_affine().to_encoded_point(false).as_bytes().to_vec()
            }

            fn data(&self) -> Result<Vec<u8>, EncodingError> {
                let encoded = self.0.to_affine().to_encoded_point(false);
                let x = encoded.x().ok_or(EncodingError::EmbeddedLength(0))?;
                let dl = usize::from(x[$field_len - 1]);
                if dl > $group.embed_len() {
                    return Err(EncodingError::EmbeddedLength(dl));
                }
                Ok(x[$field_len - 1 - dl..$field_len - 1].to_vec())
            }
        }

        impl Group for $group {
            type Scalar = $scalar;
            type Element = $point;

            fn name(&self) -> &'static str {
                $name
            }

            fn scalar_len(&self) -> usize {
                $field_len
            }

            fn element_len(&self) -> usize {
                1 + 2 * $field_len
            }

            fn scalar_order(&self) -> ByteOrder {
                ByteOrder::BigEndian
            }

            fn order_bits(&self) -> usize {
                $order_bits
            }

            fn is_constant_time(&self) -> bool {
                true
            }

            fn scalar_zero(&self) -> $scalar {
                $scalar($krate::Scalar::ZERO)
            }

            fn scalar_one(&self) -> $scalar {
                $scalar($krate::Scalar::ONE)
            }

            fn scalar_from_i64(&self, v: i64) -> $scalar {
                let abs = $krate::Scalar::from(v.unsigned_abs());
                $scalar(if v < 0 { -abs } else { abs })
            }

            fn scalar_from_bytes(&self, bytes: &[u8]) -> Result<$scalar, EncodingError> {
                check_len(bytes, $field_len)?;
                let repr = $krate::FieldBytes::clone_from_slice(bytes);
                Option::<$krate::Scalar>::from($krate::Scalar::from_repr(repr))
                    .map($scalar)
                    .ok_or(EncodingError::OutOfRange)
            }

            fn identity(&self) -> $point {
                $point($krate::ProjectivePoint::IDENTITY)
            }

            fn generator(&self) -> $point {
                $point($krate::ProjectivePoint::GENERATOR)
            }

            fn element_from_bytes(&self, bytes: &[u8]) -> Result<$point, EncodingError> {
                check_len(bytes, 1 + 2 * $field_len)?;
                if bytes.iter().all(|b| *b == 0) {
                    return Ok(self.identity());
                }
                let encoded = $krate::EncodedPoint::from_bytes(bytes).map_err(|_| EncodingError::NotOnCurve)?;
                if encoded.is_compressed() || encoded.is_identity() {
                    return Err(EncodingError::NotOnCurve);
                }
                // prime order curves: every point on the curve is in the group
                Option::<$krate::AffinePoint>::from($krate::AffinePoint::from_encoded_point(&encoded))
                    .map(|p| $point(p.into()))
                    .ok_or(EncodingError::NotOnCurve)
            }

            fn embed_len(&self) -> usize {
                ($field_bits - 8 - 8) / 8
            }

            fn embed<'a, R: RngCore + CryptoRng + ?Sized>(&self, data: &'a [u8], rng: &mut R) -> ($point, &'a [u8]) {
                let dl = data.len().min(self.embed_len());
                let mut x = [0u8; $field_len];
                loop {
                    rng.fill_bytes(&mut x);
                    x[$field_len - 1] = dl as u8;
                    x[$field_len - 1 - dl..$field_len - 1].copy_from_slice(&data[..dl]);
                    if let Some(p) = lift_x::<$field_len, _, _, _>(&x, $field_bits, rng, |c| {
                        let encoded = $krate::EncodedPoint::from_bytes(c).ok()?;
                        Option::<$krate::AffinePoint>::from($krate::AffinePoint::from_encoded_point(&encoded))
                            .map($krate::ProjectivePoint::from)
                    }) {
                        return ($point(p), &data[dl..]);
                    }
                }
            }

            fn pick_element<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> $point {
                let mut x = [0u8; $field_len];
                loop {
                    rng.fill_bytes(&mut x);
                    if let Some(p) = lift_x::<$field_len, _, _, _>(&x, $field_bits, rng, |c| {
                        let encoded = $krate::EncodedPoint::from_bytes(c).ok()?;
                        Option::<$krate::AffinePoint>::from($krate::AffinePoint::from_encoded_point(&encoded))
                            .map($krate::ProjectivePoint::from)
                    }) {
                        return $point(p);
                    }
                }
            }
        }
    };
}

/// Masks `x` down to `field_bits` and tries to decompress it with a random y parity.
fn lift_x<const L: usize, P, R, F>(x: &[u8; L], field_bits: usize, rng: &mut R, decompress: F) -> Option<P>
where
    R: RngCore + CryptoRng + ?Sized,
    F: Fn(&[u8]) -> Option<P>,
{
    let excess = L * 8 - field_bits;
    let mut compressed = vec![0u8; 1 + L];
    compressed[1..].copy_from_slice(x);
    compressed[1] &= 0xff >> excess;
    compressed[0] = 0x02 | (rng.next_u32() & 1) as u8;
    decompress(&compressed)
}

nist_curve!(
    /// NIST P-256 (secp256r1).
    P256, P256Scalar, P256Point, p256,
    name = "P256", field_len = 32, field_bits = 256, order_bits = 256,
);

nist_curve!(
    /// NIST P-384 (secp384r1).
    P384, P384Scalar, P384Point, p384,
    name = "P384", field_len = 48, field_bits = 384, order_bits = 384,
);

nist_curve!(
    /// NIST P-521 (secp521r1).
    P521, P521Scalar, P521Point, p521,
    name = "P521", field_len = 66, field_bits = 521, order_bits = 521,
);

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;

    #[test]
    fn p256_laws() {
        testing::scalar_laws(&P256, 11);
        testing::element_laws(&P256, 12);
        testing::embedding(&P256, 13);
        testing::rejects_garbage(&P256, 14);
    }

    #[test]
    fn p384_laws() {
        testing::scalar_laws(&P384, 21);
        testing::element_laws(&P384, 22);
        testing::embedding(&P384, 23);
    }

    #[test]
    fn p521_laws() {
        testing::scalar_laws(&P521, 31);
        testing::element_laws(&P521, 32);
        testing::embedding(&P521, 33);
    }

    #[test]
    fn zero_buffer_is_identity() {
        let zeros = vec![0u8; P256.element_len()];
        let id = P256.element_from_bytes(&zeros).unwrap();
        assert!(id.is_identity());
        assert_eq!(id.to_bytes(), zeros);
    }

    #[test]
    fn embed_capacity() {
        assert_eq!(P256.embed_len(), 30);
        assert_eq!(P384.embed_len(), 46);
        assert_eq!(P521.embed_len(), 63);
    }

    #[test]
    fn rejects_points_off_the_curve() {
        let mut bytes = P256.generator().to_bytes();
        bytes[64] ^= 1;
        assert_eq!(P256.element_from_bytes(&bytes), Err(EncodingError::NotOnCurve));
        let mut compressed = vec![0u8; 65];
        compressed[0] = 0x02;
        assert!(P256.element_from_bytes(&compressed).is_err());
    }
}
