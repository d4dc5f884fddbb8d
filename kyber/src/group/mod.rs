//! Abstract prime-order groups.
//!
//! A [`Group`] is a handle that constructs, decodes and samples its [`Scalar`]s and
//! [`Element`]s. Scalars and elements are plain values: every operation takes explicit operands
//! and returns a fresh value, nothing is mutated in place.

use core::fmt::Debug;

use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::encoding::{ByteOrder, EncodingError};

/// Twisted Edwards curve25519 in its prime-order subgroup.
pub mod edwards25519;
/// Short Weierstrass NIST curves P-256, P-384 and P-521.
pub mod nist;
/// Pairing-friendly curves (BN256 and BLS12-381) and their target groups.
pub mod pairing;
/// Quadratic residues modulo a safe prime.
pub mod residue;

pub use edwards25519::Ed25519;
pub use nist::{P256, P384, P521};
pub use pairing::{Bls12381G1, Bls12381G2, Bls12381Gt, Bn256G1, Bn256G2, Bn256Gt};
pub use residue::Residue512;

/// An element of the scalar field of a group, i.e. an integer modulo the group order.
///
/// Scalars are frequently secret, so every backend wipes them on [`Zeroize::zeroize`].
pub trait Scalar: Clone + PartialEq + Eq + Debug + Zeroize + Send + Sync + 'static {
    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn neg(&self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    /// Multiplicative inverse, `None` for zero.
    fn inv(&self) -> Option<Self>;
    fn is_zero(&self) -> bool;
    /// Fixed-width encoding of length [`Group::scalar_len`].
    fn to_bytes(&self) -> Vec<u8>;

    /// `self / rhs`, `None` when `rhs` is zero.
    fn div(&self, rhs: &Self) -> Option<Self> {
        rhs.inv().map(|inv| self.mul(&inv))
    }
}

/// A member of a prime-order group, written additively.
pub trait Element: Clone + PartialEq + Eq + Debug + Send + Sync + 'static {
    type Scalar: Scalar;

    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn neg(&self) -> Self;
    fn mul(&self, s: &Self::Scalar) -> Self;
    fn is_identity(&self) -> bool;
    /// Fixed-width encoding of length [`Group::element_len`].
    fn to_bytes(&self) -> Vec<u8>;
    /// Extracts the payload embedded by [`Group::embed`].
    fn data(&self) -> Result<Vec<u8>, EncodingError>;
}

/// A prime-order group together with its scalar field.
pub trait Group: Clone + Debug + Send + Sync + 'static {
    type Scalar: Scalar;
    type Element: Element<Scalar = Self::Scalar>;

    /// Stable, human readable name.
    fn name(&self) -> &'static str;
    fn scalar_len(&self) -> usize;
    fn element_len(&self) -> usize;
    /// Byte order of the scalar encoding.
    fn scalar_order(&self) -> ByteOrder;
    /// Bit length of the group order.
    fn order_bits(&self) -> usize;
    /// Whether operations on secret scalars run in constant time.
    fn is_constant_time(&self) -> bool;

    fn scalar_zero(&self) -> Self::Scalar;
    fn scalar_one(&self) -> Self::Scalar;
    fn scalar_from_i64(&self, v: i64) -> Self::Scalar;
    /// Decodes a canonical scalar; values not below the group order are rejected.
    fn scalar_from_bytes(&self, bytes: &[u8]) -> Result<Self::Scalar, EncodingError>;

    fn identity(&self) -> Self::Element;
    fn generator(&self) -> Self::Element;
    /// Decodes an element, rejecting anything outside the prime-order subgroup.
    fn element_from_bytes(&self, bytes: &[u8]) -> Result<Self::Element, EncodingError>;

    /// Number of data bytes [`Group::embed`] can carry in one element.
    fn embed_len(&self) -> usize;
    /// Embeds up to [`Group::embed_len`] bytes of `data` into a random element and returns the
    /// bytes that did not fit.
    fn embed<'a, R: RngCore + CryptoRng + ?Sized>(&self, data: &'a [u8], rng: &mut R) -> (Self::Element, &'a [u8]);

    /// Uniform random element of the prime-order subgroup.
    fn pick_element<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> Self::Element;

    /// Uniform scalar in `[0, q)` by rejection sampling of `scalar_len` random bytes, masked
    /// down to the bit length of the order.
    fn pick_scalar<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> Self::Scalar {
        let len = self.scalar_len();
        let excess = (len * 8).saturating_sub(self.order_bits()).min(7);
        let msb = self.scalar_order().msb_index(len);
        let mut buf = vec![0u8; len];
        loop {
            rng.fill_bytes(&mut buf);
            buf[msb] &= 0xff >> excess;
            if let Ok(s) = self.scalar_from_bytes(&buf) {
                return s;
            }
        }
    }

    /// `s · G`
    fn base_mul(&self, s: &Self::Scalar) -> Self::Element {
        self.generator().mul(s)
    }

    /// `s · base`, where a missing base means the standard generator.
    fn mul(&self, s: &Self::Scalar, base: Option<&Self::Element>) -> Self::Element {
        match base {
            Some(base) => base.mul(s),
            None => self.base_mul(s),
        }
    }
}

/// Groups whose elements can be encoded as strings indistinguishable from uniform bytes.
pub trait Hiding: Group {
    fn hide_len(&self) -> usize;
    /// Returns `None` when this particular element has no hiding encoding; callers pick a new
    /// element and retry.
    fn hide_encode<R: RngCore + CryptoRng + ?Sized>(&self, e: &Self::Element, rng: &mut R) -> Option<Vec<u8>>;
    /// Maps every [`Hiding::hide_len`]-byte string to some element. Only the length is checked.
    fn hide_decode(&self, bytes: &[u8]) -> Result<Self::Element, EncodingError>;
}

/// Shared property tests run against every backend.
#[cfg(test)]
pub(crate) mod testing {
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    pub fn rng(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    pub fn scalar_laws<G: Group>(g: &G, seed: u64) {
        let mut rng = rng(seed);
        let zero = g.scalar_zero();
        let one = g.scalar_one();
        for _ in 0..8 {
            let x = g.pick_scalar(&mut rng);
            let y = g.pick_scalar(&mut rng);
            let z = g.pick_scalar(&mut rng);
            assert_eq!(x.add(&y).sub(&y), x);
            assert_eq!(x.add(&y), y.add(&x));
            assert_eq!(x.add(&y).add(&z), x.add(&y.add(&z)));
            assert_eq!(x.mul(&y).mul(&z), x.mul(&y.mul(&z)));
            assert_eq!(x.add(&x.neg()), zero);
            if !x.is_zero() {
                assert_eq!(x.mul(&x.inv().unwrap()), one);
                assert_eq!(x.div(&x).unwrap(), one);
            }
            let bytes = x.to_bytes();
            assert_eq!(bytes.len(), g.scalar_len());
            assert_eq!(g.scalar_from_bytes(&bytes).unwrap(), x);
        }
        assert!(one.div(&zero).is_none());
        assert_eq!(g.scalar_from_i64(-1).add(&one), zero);
        for v in [0i64, 1, -7, 1 << 40, i64::MAX, i64::MIN] {
            let s = g.scalar_from_i64(v);
            let bytes = s.to_bytes();
            assert_eq!(bytes.len(), g.scalar_len());
            assert_eq!(g.scalar_from_bytes(&bytes).unwrap(), s);
        }
        assert!(g.scalar_from_bytes(&vec![0xff; g.scalar_len()]).is_err());
        assert!(g.scalar_from_bytes(&[0u8; 3]).is_err());
    }

    pub fn element_laws<G: Group>(g: &G, seed: u64) {
        let mut rng = rng(seed);
        let id = g.identity();
        assert!(id.is_identity());
        assert_eq!(g.base_mul(&g.scalar_one()), g.generator());
        assert_eq!(g.mul(&g.scalar_one(), None), g.generator());
        for _ in 0..4 {
            let p = g.pick_element(&mut rng);
            let q = g.pick_element(&mut rng);
            let a = g.pick_scalar(&mut rng);
            let b = g.pick_scalar(&mut rng);
            assert_eq!(p.add(&p.neg()), id);
            assert_eq!(p.add(&q), q.add(&p));
            assert_eq!(p.sub(&q).add(&q), p);
            assert_eq!(p.mul(&a.add(&b)), p.mul(&a).add(&p.mul(&b)));
            assert_eq!(p.mul(&b).mul(&a), p.mul(&a.mul(&b)));
            assert_eq!(g.mul(&a, Some(&p)), p.mul(&a));
            let bytes = p.to_bytes();
            assert_eq!(bytes.len(), g.element_len());
            assert_eq!(g.element_from_bytes(&bytes).unwrap(), p);
        }
        let bytes = id.to_bytes();
        assert_eq!(bytes.len(), g.element_len());
        assert_eq!(g.element_from_bytes(&bytes).unwrap(), id);
        assert!(g.element_from_bytes(&[1u8; 2]).is_err());
    }

    pub fn embedding<G: Group>(g: &G, seed: u64) {
        let mut rng = rng(seed);
        let max = g.embed_len();
        for len in [0, 1, max / 2, max] {
            let data: Vec<u8> = (0..len).map(|i| i as u8 ^ 0xa5).collect();
            let (e, tail) = g.embed(&data, &mut rng);
            assert!(tail.is_empty());
            assert_eq!(e.data().unwrap(), data);
            assert_eq!(g.element_from_bytes(&e.to_bytes()).unwrap(), e);
        }
        let long: Vec<u8> = (0..max + 3).map(|i| i as u8).collect();
        let (e, tail) = g.embed(&long, &mut rng);
        assert_eq!(tail, &long[max..]);
        assert_eq!(e.data().unwrap(), &long[..max]);
    }

    /// Random strings either fail to decode or decode to something that re-encodes identically.
    pub fn rejects_garbage<G: Group>(g: &G, seed: u64) {
        let mut rng = rng(seed);
        let mut buf = vec![0u8; g.element_len()];
        for _ in 0..64 {
            rng.fill_bytes(&mut buf);
            if let Ok(e) = g.element_from_bytes(&buf) {
                assert_eq!(g.element_from_bytes(&e.to_bytes()).unwrap(), e);
            }
        }
    }
}
