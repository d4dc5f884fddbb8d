use core::fmt;

use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar as DalekScalar,
    traits::{Identity, IsIdentity},
};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use super::{Element, Group, Scalar};
use crate::encoding::{check_len, ByteOrder, EncodingError};

const SCALAR_LEN: usize = 32;
const POINT_LEN: usize = 32;
// (255 - 8 - 8) / 8: one length byte, one byte of randomness
const EMBED_LEN: usize = 29;

/// Ed25519: the prime-order subgroup of the twisted Edwards form of Curve25519.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ed25519;

/// Scalar modulo the Ed25519 group order, little-endian on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Scalar(DalekScalar);

impl fmt::Debug for Ed25519Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Scalar({})", hex::encode(self.0.as_bytes()))
    }
}

impl Zeroize for Ed25519Scalar {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl From<DalekScalar> for Ed25519Scalar {
    fn from(s: DalekScalar) -> Self {
        Self(s)
    }
}

impl Scalar for Ed25519Scalar {
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
        if self.is_zero() {
            return None;
        }
        Some(Self(self.0.invert()))
    }

    fn is_zero(&self) -> bool {
        self.0 == DalekScalar::ZERO
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }
}

/// A point of the prime-order subgroup, in extended coordinates.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Point(EdwardsPoint);

impl fmt::Debug for Ed25519Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Point({})", hex::encode(self.0.compress().as_bytes()))
    }
}

impl Ed25519Point {
    pub fn inner(&self) -> &EdwardsPoint {
        &self.0
    }
}

impl Element for Ed25519Point {
    type Scalar = Ed25519Scalar;

    fn add(&self, rhs: &Self) -> Self {
        Self(self.0 + rhs.0)
    }

    fn sub(&self, rhs: &Self) -> Self {
        Self(self.0 - rhs.0)
    }

    fn neg(&self) -> Self {
        Self(-self.0)
    }

    fn mul(&self, s: &Ed25519Scalar) -> Self {
        Self(self.0 * s.0)
    }

    fn is_identity(&self) -> bool {
        self.0.is_identity()
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.compress().to_bytes().to_vec()
    }

    fn data(&self) -> Result<Vec<u8>, EncodingError> {
        let bytes = self.0.compress().to_bytes();
        let dl = usize::from(bytes[0]);
        if dl > EMBED_LEN {
            return Err(EncodingError::EmbeddedLength(dl));
        }
        Ok(bytes[1..1 + dl].to_vec())
    }
}

/// Decompresses `bytes`, accepting only canonical encodings.
fn decompress(bytes: [u8; POINT_LEN]) -> Result<EdwardsPoint, EncodingError> {
    let p = CompressedEdwardsY(bytes).decompress().ok_or(EncodingError::NotOnCurve)?;
    if p.compress().to_bytes() != bytes {
        return Err(EncodingError::NonCanonical);
    }
    Ok(p)
}

impl Group for Ed25519 {
    type Scalar = Ed25519Scalar;
    type Element = Ed25519Point;

    fn name(&self) -> &'static str {
        "Ed25519"
    }

    fn scalar_len(&self) -> usize {
        SCALAR_LEN
    }

    fn element_len(&self) -> usize {
        POINT_LEN
    }

    fn scalar_order(&self) -> ByteOrder {
        ByteOrder::LittleEndian
    }

    fn order_bits(&self) -> usize {
        253
    }

    fn is_constant_time(&self) -> bool {
        true
    }

    fn scalar_zero(&self) -> Ed25519Scalar {
        Ed25519Scalar(DalekScalar::ZERO)
    }

    fn scalar_one(&self) -> Ed25519Scalar {
        Ed25519Scalar(DalekScalar::ONE)
    }

    fn scalar_from_i64(&self, v: i64) -> Ed25519Scalar {
        let abs = DalekScalar::from(v.unsigned_abs());
        Ed25519Scalar(if v < 0 { -abs } else { abs })
    }

    fn scalar_from_bytes(&self, bytes: &[u8]) -> Result<Ed25519Scalar, EncodingError> {
        check_len(bytes, SCALAR_LEN)?;
        let mut buf = [0u8; SCALAR_LEN];
        buf.copy_from_slice(bytes);
        Option::<DalekScalar>::from(DalekScalar::from_canonical_bytes(buf))
            .map(Ed25519Scalar)
            .ok_or(EncodingError::OutOfRange)
    }

    fn identity(&self) -> Ed25519Point {
        Ed25519Point(EdwardsPoint::identity())
    }

    fn generator(&self) -> Ed25519Point {
        Ed25519Point(ED25519_BASEPOINT_POINT)
    }

    fn base_mul(&self, s: &Ed25519Scalar) -> Ed25519Point {
        Ed25519Point(EdwardsPoint::mul_base(&s.0))
    }

    fn element_from_bytes(&self, bytes: &[u8]) -> Result<Ed25519Point, EncodingError> {
        check_len(bytes, POINT_LEN)?;
        let mut buf = [0u8; POINT_LEN];
        buf.copy_from_slice(bytes);
        let p = decompress(buf)?;
        if !p.is_torsion_free() {
            return Err(EncodingError::NotInSubgroup);
        }
        Ok(Ed25519Point(p))
    }

    fn embed_len(&self) -> usize {
        EMBED_LEN
    }

    fn embed<'a, R: RngCore + CryptoRng + ?Sized>(&self, data: &'a [u8], rng: &mut R) -> (Ed25519Point, &'a [u8]) {
        let dl = data.len().min(EMBED_LEN);
        let mut buf = [0u8; POINT_LEN];
        loop {
            rng.fill_bytes(&mut buf);
            buf[0] = dl as u8;
            buf[1..1 + dl].copy_from_slice(&data[..dl]);
            // the cofactor would scramble the payload, so only subgroup points are kept
            if let Some(p) = decompress(buf).ok().filter(|p| p.is_torsion_free()) {
                return (Ed25519Point(p), &data[dl..]);
            }
        }
    }

    fn pick_element<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> Ed25519Point {
        let mut buf = [0u8; POINT_LEN];
        loop {
            rng.fill_bytes(&mut buf);
            let Some(p) = CompressedEdwardsY(buf).decompress() else {
                continue;
            };
            let p = p.mul_by_cofactor();
            if !p.is_identity() {
                return Ed25519Point(p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;

    #[test]
    fn scalar_laws() {
        testing::scalar_laws(&Ed25519, 1);
    }

    #[test]
    fn element_laws() {
        testing::element_laws(&Ed25519, 2);
    }

    #[test]
    fn embedding() {
        testing::embedding(&Ed25519, 3);
    }

    #[test]
    fn rejects_garbage() {
        testing::rejects_garbage(&Ed25519, 4);
    }

    #[test]
    fn rejects_small_order_points() {
        // a point of order 2: (0, -1)
        let mut buf = [0xffu8; 32];
        buf[0] = 0xec;
        buf[31] = 0x7f;
        assert_eq!(Ed25519.element_from_bytes(&buf), Err(EncodingError::NotInSubgroup));
    }

    #[test]
    fn rejects_unreduced_y() {
        // y = p + 1 decodes to the identity but is not its encoding
        let mut buf = [0xffu8; 32];
        buf[0] = 0xee;
        buf[31] = 0x7f;
        assert_eq!(Ed25519.element_from_bytes(&buf), Err(EncodingError::NonCanonical));
    }

    #[test]
    fn identity_encoding() {
        let mut expected = [0u8; 32];
        expected[0] = 1;
        assert_eq!(Ed25519.identity().to_bytes(), expected.to_vec());
    }

    #[test]
    fn scalars_are_little_endian() {
        let two = Ed25519.scalar_from_i64(2);
        let mut expected = [0u8; 32];
        expected[0] = 2;
        assert_eq!(two.to_bytes(), expected.to_vec());
    }
}
