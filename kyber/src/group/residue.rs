//! The subgroup of quadratic residues modulo the 512-bit safe prime `p = 2q + 1`.
//!
//! Element arithmetic is modular exponentiation on [`ModInt`]s and does not run in constant time.

use core::fmt;
use std::sync::{Arc, OnceLock};

use num_bigint::BigUint;
use num_traits::One;
use rand_core::{CryptoRng, RngCore};

use super::{Element, Group, Hiding, Scalar};
use crate::{
    encoding::{check_len, ByteOrder, EncodingError},
    modint::{jacobi, ModInt},
};

#[rustfmt::skip]
const P_BYTES: [u8; 64] = [
    0xe5, 0x3f, 0x54, 0x67, 0xd4, 0x1c, 0xfa, 0xcd, 0xd8, 0xc9, 0x56, 0x87, 0xd3, 0x4b, 0x59, 0x02,
    0xb0, 0x3b, 0x30, 0x48, 0x72, 0x8a, 0x9e, 0x94, 0x3e, 0x52, 0xd8, 0x95, 0x08, 0x98, 0x8a, 0x9c,
    0x55, 0xe0, 0x65, 0x6f, 0x01, 0x10, 0x15, 0xa3, 0xc8, 0xb7, 0xec, 0x0a, 0x00, 0x23, 0x2d, 0x40,
    0xa0, 0x4d, 0x3e, 0xf8, 0x51, 0x1f, 0x3a, 0x5f, 0x01, 0xf3, 0xa5, 0xc6, 0xde, 0x4a, 0x7d, 0x27,
];

const ELEMENT_LEN: usize = 64;
const SCALAR_LEN: usize = 64;
// (512 - 8 - 16) / 8: a 16-bit length trailer and one byte of randomness
const EMBED_LEN: usize = 61;

struct Params {
    p: Arc<BigUint>,
    q: Arc<BigUint>,
    g: BigUint,
}

fn params() -> &'static Params {
    static PARAMS: OnceLock<Params> = OnceLock::new();
    PARAMS.get_or_init(|| {
        let p = BigUint::from_bytes_be(&P_BYTES);
        let q = (&p - 1u32) >> 1u32;
        // 4 = 2² is a residue different from one, hence a generator of the order-q subgroup
        Params { p: Arc::new(p), q: Arc::new(q), g: BigUint::from(4u32) }
    })
}

/// Quadratic residues modulo a 512-bit safe prime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Residue512;

/// Exponent modulo `q`.
#[derive(Clone, PartialEq, Eq)]
pub struct ResidueScalar(ModInt);

impl fmt::Debug for ResidueScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResidueScalar({})", self.0)
    }
}

impl ResidueScalar {
    pub fn as_modint(&self) -> &ModInt {
        &self.0
    }
}

impl zeroize::Zeroize for ResidueScalar {
    fn zeroize(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.0);
    }
}

impl Scalar for ResidueScalar {
    fn add(&self, rhs: &Self) -> Self {
        Self(self.0.add(&rhs.0))
    }

    fn sub(&self, rhs: &Self) -> Self {
        Self(self.0.sub(&rhs.0))
    }

    fn neg(&self) -> Self {
        Self(self.0.neg())
    }

    fn mul(&self, rhs: &Self) -> Self {
        Self(self.0.mul(&rhs.0))
    }

    fn inv(&self) -> Option<Self> {
        self.0.inv().map(Self)
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }
}

/// A quadratic residue modulo `p`, written additively.
#[derive(Clone, PartialEq, Eq)]
pub struct ResidueElement(ModInt);

impl fmt::Debug for ResidueElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResidueElement({})", self.0)
    }
}

impl Element for ResidueElement {
    type Scalar = ResidueScalar;

    fn add(&self, rhs: &Self) -> Self {
        Self(self.0.mul(&rhs.0))
    }

    fn sub(&self, rhs: &Self) -> Self {
        self.add(&rhs.neg())
    }

    fn neg(&self) -> Self {
        // every element is a unit modulo p
        match self.0.inv() {
            Some(inv) => Self(inv),
            None => self.clone(),
        }
    }

    fn mul(&self, s: &ResidueScalar) -> Self {
        Self(self.0.exp(s.0.value()))
    }

    fn is_identity(&self) -> bool {
        self.0.value().is_one()
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    fn data(&self) -> Result<Vec<u8>, EncodingError> {
        let bytes = self.0.to_bytes();
        let dl = usize::from(u16::from_be_bytes([bytes[ELEMENT_LEN - 2], bytes[ELEMENT_LEN - 1]]));
        if dl > EMBED_LEN {
            return Err(EncodingError::EmbeddedLength(dl));
        }
        Ok(bytes[ELEMENT_LEN - 2 - dl..ELEMENT_LEN - 2].to_vec())
    }
}

fn is_residue(v: &BigUint) -> bool {
    jacobi(v, &params().p) == 1
}

impl Group for Residue512 {
    type Scalar = ResidueScalar;
    type Element = ResidueElement;

    fn name(&self) -> &'static str {
        "Residue512"
    }

    fn scalar_len(&self) -> usize {
        SCALAR_LEN
    }

    fn element_len(&self) -> usize {
        ELEMENT_LEN
    }

    fn scalar_order(&self) -> ByteOrder {
        ByteOrder::BigEndian
    }

    fn order_bits(&self) -> usize {
        params().q.bits() as usize
    }

    fn is_constant_time(&self) -> bool {
        false
    }

    fn scalar_zero(&self) -> ResidueScalar {
        ResidueScalar(ModInt::zero(params().q.clone()))
    }

    fn scalar_one(&self) -> ResidueScalar {
        ResidueScalar(ModInt::one(params().q.clone()))
    }

    fn scalar_from_i64(&self, v: i64) -> ResidueScalar {
        ResidueScalar(ModInt::from_i64(v, params().q.clone()))
    }

    fn scalar_from_bytes(&self, bytes: &[u8]) -> Result<ResidueScalar, EncodingError> {
        ModInt::from_bytes(bytes, params().q.clone(), ByteOrder::BigEndian).map(ResidueScalar)
    }

    fn pick_scalar<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> ResidueScalar {
        ResidueScalar(ModInt::random(params().q.clone(), rng))
    }

    fn identity(&self) -> ResidueElement {
        ResidueElement(ModInt::one(params().p.clone()))
    }

    fn generator(&self) -> ResidueElement {
        ResidueElement(ModInt::new(params().g.clone(), params().p.clone()))
    }

    fn element_from_bytes(&self, bytes: &[u8]) -> Result<ResidueElement, EncodingError> {
        let v = ModInt::from_bytes(bytes, params().p.clone(), ByteOrder::BigEndian)?;
        if v.is_zero() || !is_residue(v.value()) {
            return Err(EncodingError::NotInSubgroup);
        }
        Ok(ResidueElement(v))
    }

    fn embed_len(&self) -> usize {
        EMBED_LEN
    }

    fn embed<'a, R: RngCore + CryptoRng + ?Sized>(&self, data: &'a [u8], rng: &mut R) -> (ResidueElement, &'a [u8]) {
        let dl = data.len().min(EMBED_LEN);
        let mut buf = [0u8; ELEMENT_LEN];
        loop {
            rng.fill_bytes(&mut buf);
            buf[ELEMENT_LEN - 2..].copy_from_slice(&(dl as u16).to_be_bytes());
            buf[ELEMENT_LEN - 2 - dl..ELEMENT_LEN - 2].copy_from_slice(&data[..dl]);
            if let Ok(e) = self.element_from_bytes(&buf) {
                return (e, &data[dl..]);
            }
        }
    }

    fn pick_element<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> ResidueElement {
        loop {
            let r = ModInt::random(params().p.clone(), rng);
            if !r.is_zero() {
                return ResidueElement(r.mul(&r));
            }
        }
    }
}

impl Hiding for Residue512 {
    fn hide_len(&self) -> usize {
        ModInt::zero(params().q.clone()).hide_len()
    }

    /// Folds `x` onto `y = min(x, p - x)` in `[1, q]`, then hides `y - 1` modulo `q`.
    fn hide_encode<R: RngCore + CryptoRng + ?Sized>(&self, e: &ResidueElement, rng: &mut R) -> Option<Vec<u8>> {
        let p = params().p.as_ref();
        let x = e.0.value();
        let flipped = p - x;
        let y = if *x <= flipped { x.clone() } else { flipped };
        let folded = ModInt::new(y - 1u32, params().q.clone());
        folded.hide_encode(rng)
    }

    /// Exactly one of `y` and `p - y` is a residue since `-1` is not (`p ≡ 3 mod 4`).
    fn hide_decode(&self, bytes: &[u8]) -> Result<ResidueElement, EncodingError> {
        check_len(bytes, self.hide_len())?;
        let folded = ModInt::hide_decode(bytes, params().q.clone())?;
        let y = folded.value() + 1u32;
        let p = params().p.clone();
        let v = if is_residue(&y) { y } else { p.as_ref() - y };
        Ok(ResidueElement(ModInt::new(v, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;

    #[test]
    fn parameters_describe_a_safe_prime_group() {
        let Params { p, q, g } = params();
        assert_eq!(p.bits(), 512);
        assert_eq!(q.bits(), 511);
        assert_eq!(&(q.as_ref() * 2u32 + 1u32), p.as_ref());
        assert!(g.modpow(q, p).is_one());
        assert_eq!(p.iter_u32_digits().next().unwrap() & 3, 3);
    }

    #[test]
    fn scalar_laws() {
        testing::scalar_laws(&Residue512, 41);
    }

    #[test]
    fn element_laws() {
        testing::element_laws(&Residue512, 42);
    }

    #[test]
    fn embedding() {
        testing::embedding(&Residue512, 43);
    }

    #[test]
    fn rejects_non_residues() {
        let g = Residue512;
        // p - 1 = -1 is a non-residue
        let minus_one = (params().p.as_ref() - 1u32).to_bytes_be();
        assert_eq!(g.element_from_bytes(&minus_one), Err(EncodingError::NotInSubgroup));
        assert_eq!(g.element_from_bytes(&[0u8; ELEMENT_LEN]), Err(EncodingError::NotInSubgroup));
        assert!(!g.is_constant_time());
    }

    fn pick_hidden(g: &Residue512, rng: &mut rand_chacha::ChaCha20Rng) -> (ResidueElement, Vec<u8>) {
        loop {
            let e = g.pick_element(rng);
            if let Some(hidden) = g.hide_encode(&e, rng) {
                return (e, hidden);
            }
        }
    }

    #[test]
    fn hiding_round_trip() {
        let g = Residue512;
        let mut rng = testing::rng(44);
        for _ in 0..32 {
            let (e, hidden) = pick_hidden(&g, &mut rng);
            assert_eq!(hidden.len(), g.hide_len());
            assert_eq!(g.hide_decode(&hidden).unwrap(), e);
        }
    }

    #[test]
    fn hide_decode_never_fails() {
        let g = Residue512;
        let mut rng = testing::rng(45);
        let mut buf = vec![0u8; g.hide_len()];
        for _ in 0..64 {
            rng.fill_bytes(&mut buf);
            let e = g.hide_decode(&buf).unwrap();
            assert_eq!(g.element_from_bytes(&e.to_bytes()).unwrap(), e);
        }
        assert!(g.hide_decode(&buf[1..]).is_err());
    }

    /// χ² statistic of the top nibble of `samples` hidden encodings, over 16 buckets.
    fn hidden_nibble_chi2(samples: usize, seed: u64) -> f64 {
        let g = Residue512;
        let mut rng = testing::rng(seed);
        let mut buckets = [0usize; 16];
        for _ in 0..samples {
            let (_, hidden) = pick_hidden(&g, &mut rng);
            buckets[usize::from(hidden[0] >> 4)] += 1;
        }
        let expected = samples as f64 / 16.0;
        buckets.iter().map(|&o| (o as f64 - expected).powi(2) / expected).sum()
    }

    // 15 degrees of freedom, p = 0.001
    const CHI2_BOUND: f64 = 37.7;

    #[test]
    fn hidden_bytes_look_uniform() {
        let chi2 = hidden_nibble_chi2(4096, 46);
        assert!(chi2 < CHI2_BOUND, "chi2 = {chi2}");
    }

    #[test]
    #[ignore = "slow: 100k hidden encodings"]
    fn hidden_bytes_look_uniform_at_scale() {
        let chi2 = hidden_nibble_chi2(100_000, 47);
        assert!(chi2 < CHI2_BOUND, "chi2 = {chi2}");
    }
}
