//! Arbitrary precision integers reduced modulo a fixed modulus.
//!
//! A [`ModInt`] owns its value and shares its modulus. Every operation returns a new, fully
//! reduced value that adopts the modulus (and byte order) of the left operand.

use core::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand_core::{CryptoRng, RngCore};

use crate::encoding::{check_len, pad_be, ByteOrder, EncodingError};

/// Integer modulo `m`.
#[derive(Clone)]
pub struct ModInt {
    value: BigUint,
    modulus: Arc<BigUint>,
    order: ByteOrder,
}

impl fmt::Debug for ModInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModInt(0x{})", self.value.to_str_radix(16))
    }
}

impl fmt::Display for ModInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for ModInt {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.modulus == other.modulus
    }
}

impl Eq for ModInt {}

impl zeroize::Zeroize for ModInt {
    /// Resets the value to zero; `BigUint` offers no way to scrub its old limbs.
    fn zeroize(&mut self) {
        self.value.set_zero();
    }
}

impl ModInt {
    /// Creates `value mod modulus`.
    pub fn new(value: BigUint, modulus: Arc<BigUint>) -> Self {
        let value = value % modulus.as_ref();
        Self { value, modulus, order: ByteOrder::BigEndian }
    }

    /// The additive identity modulo `modulus`.
    pub fn zero(modulus: Arc<BigUint>) -> Self {
        Self { value: BigUint::zero(), modulus, order: ByteOrder::BigEndian }
    }

    /// The multiplicative identity modulo `modulus`.
    pub fn one(modulus: Arc<BigUint>) -> Self {
        Self::new(BigUint::one(), modulus)
    }

    /// Reduces a signed machine integer; negative values wrap around the modulus.
    pub fn from_i64(v: i64, modulus: Arc<BigUint>) -> Self {
        let abs = BigUint::from(v.unsigned_abs()) % modulus.as_ref();
        let value = if v < 0 && !abs.is_zero() { modulus.as_ref() - abs } else { abs };
        Self { value, modulus, order: ByteOrder::BigEndian }
    }

    /// Decodes a fixed-length encoding.
    ///
    /// Fails when the length is not [`ModInt::marshal_len`] or when the value is not below the modulus.
    pub fn from_bytes(bytes: &[u8], modulus: Arc<BigUint>, order: ByteOrder) -> Result<Self, EncodingError> {
        check_len(bytes, marshal_len(&modulus))?;
        let value = match order {
            ByteOrder::BigEndian => BigUint::from_bytes_be(bytes),
            ByteOrder::LittleEndian => BigUint::from_bytes_le(bytes),
        };
        if value >= *modulus {
            return Err(EncodingError::OutOfRange);
        }
        Ok(Self { value, modulus, order })
    }

    /// Draws a uniform value in `[0, m)` by rejection sampling.
    pub fn random<R: RngCore + CryptoRng + ?Sized>(modulus: Arc<BigUint>, rng: &mut R) -> Self {
        let len = marshal_len(&modulus);
        let excess = len * 8 - modulus.bits() as usize;
        let mut buf = vec![0u8; len];
        loop {
            rng.fill_bytes(&mut buf);
            buf[0] &= 0xff >> excess;
            let value = BigUint::from_bytes_be(&buf);
            if value < *modulus {
                return Self { value, modulus, order: ByteOrder::BigEndian };
            }
        }
    }

    /// Returns the same value with a different serialisation byte order.
    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn modulus(&self) -> &Arc<BigUint> {
        &self.modulus
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    fn derive(&self, value: BigUint) -> Self {
        Self { value, modulus: self.modulus.clone(), order: self.order }
    }

    pub fn add(&self, rhs: &Self) -> Self {
        self.derive((&self.value + &rhs.value) % self.modulus.as_ref())
    }

    pub fn sub(&self, rhs: &Self) -> Self {
        let m = self.modulus.as_ref();
        let rhs = &rhs.value % m;
        self.derive((&self.value + m - rhs) % m)
    }

    pub fn neg(&self) -> Self {
        if self.value.is_zero() {
            return self.clone();
        }
        self.derive(self.modulus.as_ref() - &self.value)
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        self.derive((&self.value * &rhs.value) % self.modulus.as_ref())
    }

    /// Multiplies by the inverse of `rhs`; `None` when `rhs` has no inverse.
    pub fn div(&self, rhs: &Self) -> Option<Self> {
        rhs.inv().map(|inv| self.mul(&inv))
    }

    /// Multiplicative inverse; `None` for zero or any value sharing a factor with the modulus.
    pub fn inv(&self) -> Option<Self> {
        if self.value.is_zero() {
            return None;
        }
        self.value.modinv(&self.modulus).map(|v| self.derive(v))
    }

    /// Raises to a bignum exponent.
    pub fn exp(&self, e: &BigUint) -> Self {
        self.derive(self.value.modpow(e, &self.modulus))
    }

    /// Jacobi symbol `(value / m)`, defined for odd moduli.
    pub fn jacobi(&self) -> i8 {
        jacobi(&self.value, &self.modulus)
    }

    /// Square root modulo an odd prime modulus; `None` when the value is a non-residue.
    pub fn sqrt(&self) -> Option<Self> {
        sqrt_mod_prime(&self.value, &self.modulus).map(|v| self.derive(v))
    }

    /// Number of bytes of the fixed-length encoding.
    pub fn marshal_len(&self) -> usize {
        marshal_len(&self.modulus)
    }

    /// Fixed-length, zero padded encoding in this integer's byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.marshal_len();
        let mut out = vec![0u8; len];
        let be = self.value.to_bytes_be();
        // value < m, so the big-endian digits always fit
        out[len - be.len()..].copy_from_slice(&be);
        if self.order == ByteOrder::LittleEndian {
            out.reverse();
        }
        out
    }

    /// Length of the hiding encoding.
    pub fn hide_len(&self) -> usize {
        self.marshal_len()
    }

    /// Encodes the value as `v + k·m` for a uniform `k < ⌈2^(8·len) / m⌉`, with `len` the
    /// [`ModInt::hide_len`]. Returns `None` when the result does not fit in `len` bytes. Callers
    /// retrying with fresh uniform values see uniform strings.
    pub fn hide_encode<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> Option<Vec<u8>> {
        let len = self.hide_len();
        let m = self.modulus.as_ref();
        let span = BigUint::one() << (len * 8);
        // at most 256 since m has more than 8·(len - 1) bits
        let slots = ((&span + m - 1u32) / m).to_u32()?;
        let mask = slots.next_power_of_two() - 1;
        let k = loop {
            let k = rng.next_u32() & mask;
            if k < slots {
                break k;
            }
        };
        let enc = &self.value + m * BigUint::from(k);
        if enc >= span {
            return None;
        }
        pad_be(&enc.to_bytes_be(), len).ok()
    }

    /// Inverse of [`ModInt::hide_encode`]. Only the length is checked; any string decodes.
    pub fn hide_decode(bytes: &[u8], modulus: Arc<BigUint>) -> Result<Self, EncodingError> {
        check_len(bytes, marshal_len(&modulus))?;
        Ok(Self::new(BigUint::from_bytes_be(bytes), modulus))
    }
}

/// `⌈bitlen(m) / 8⌉`
pub fn marshal_len(modulus: &BigUint) -> usize {
    (modulus.bits() as usize + 7) / 8
}

fn low_u32(n: &BigUint) -> u32 {
    n.iter_u32_digits().next().unwrap_or(0)
}

/// Jacobi symbol of `x` over the odd integer `y`.
pub fn jacobi(x: &BigUint, y: &BigUint) -> i8 {
    let mut a = x % y;
    let mut n = y.clone();
    let mut j = 1i8;
    while !a.is_zero() {
        while a.is_even() {
            a >>= 1u32;
            let r = low_u32(&n) & 7;
            if r == 3 || r == 5 {
                j = -j;
            }
        }
        core::mem::swap(&mut a, &mut n);
        if low_u32(&a) & 3 == 3 && low_u32(&n) & 3 == 3 {
            j = -j;
        }
        a %= &n;
    }
    if n.is_one() {
        j
    } else {
        0
    }
}

/// Tonelli–Shanks square root modulo an odd prime `p`.
pub fn sqrt_mod_prime(a: &BigUint, p: &BigUint) -> Option<BigUint> {
    let a = a % p;
    if a.is_zero() {
        return Some(a);
    }
    if jacobi(&a, p) != 1 {
        return None;
    }
    let one = BigUint::one();
    if low_u32(p) & 3 == 3 {
        let e = (p + &one) >> 2u32;
        return Some(a.modpow(&e, p));
    }

    let p_minus_one = p - &one;
    let s = p_minus_one.trailing_zeros()?;
    let q = &p_minus_one >> s;
    let mut z = BigUint::from(2u32);
    while jacobi(&z, p) != -1 {
        z += 1u32;
    }

    let mut m = s;
    let mut c = z.modpow(&q, p);
    let mut t = a.modpow(&q, p);
    let mut r = a.modpow(&((&q + &one) >> 1u32), p);
    while !t.is_one() {
        let mut i = 0u64;
        let mut t2 = t.clone();
        while !t2.is_one() {
            t2 = &t2 * &t2 % p;
            i += 1;
            if i == m {
                return None;
            }
        }
        let b = c.modpow(&(BigUint::one() << (m - i - 1)), p);
        m = i;
        c = &b * &b % p;
        t = t * &c % p;
        r = r * &b % p;
    }
    Some(r)
}

#[cfg(test)]
mod tests {
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use test_strategy::proptest;

    use super::*;

    fn modulus(v: u64) -> Arc<BigUint> {
        Arc::new(BigUint::from(v))
    }

    // 2^61 - 1, a Mersenne prime
    const P61: u64 = (1 << 61) - 1;
    // p ≡ 1 mod 4, exercises the full Tonelli–Shanks loop
    const P_1MOD4: u64 = 998_244_353;

    #[test]
    fn signed_values_wrap_around() {
        let m = modulus(17);
        assert_eq!(ModInt::from_i64(-1, m.clone()).value(), &BigUint::from(16u32));
        assert_eq!(ModInt::from_i64(-34, m.clone()).value(), &BigUint::zero());
        assert_eq!(ModInt::from_i64(20, m).value(), &BigUint::from(3u32));
    }

    #[test]
    fn division_by_zero_fails() {
        let m = modulus(17);
        let a = ModInt::from_i64(5, m.clone());
        assert!(a.div(&ModInt::zero(m.clone())).is_none());
        assert!(ModInt::zero(m).inv().is_none());
    }

    #[test]
    fn encodings_are_fixed_width_in_both_orders() {
        let m = modulus(0x1_0001);
        let a = ModInt::from_i64(0x0102, m.clone());
        assert_eq!(a.marshal_len(), 3);
        assert_eq!(a.to_bytes(), vec![0, 1, 2]);
        let le = a.clone().with_order(ByteOrder::LittleEndian);
        assert_eq!(le.to_bytes(), vec![2, 1, 0]);
        let back = ModInt::from_bytes(&le.to_bytes(), m.clone(), ByteOrder::LittleEndian).unwrap();
        assert_eq!(back, a);
        assert_eq!(ModInt::from_bytes(&[1, 0, 1], m.clone(), ByteOrder::BigEndian), Err(EncodingError::OutOfRange));
        assert!(matches!(ModInt::from_bytes(&[1, 0], m, ByteOrder::BigEndian), Err(EncodingError::InvalidLength { .. })));
    }

    #[test]
    fn jacobi_matches_euler_criterion() {
        let p = BigUint::from(1_000_003u64);
        let e = (&p - 1u32) >> 1u32;
        for x in 1u32..200 {
            let x = BigUint::from(x);
            let euler = x.modpow(&e, &p);
            let expected = if euler.is_one() { 1 } else { -1 };
            assert_eq!(jacobi(&x, &p), expected);
        }
        assert_eq!(jacobi(&BigUint::from(0u32), &p), 0);
        assert_eq!(jacobi(&BigUint::from(3u32), &BigUint::from(9u32)), 0);
    }

    #[proptest]
    fn sqrt_squares_back(#[strategy(1u64..P61)] x: u64) {
        for p in [P61, P_1MOD4] {
            let a = ModInt::from_i64(x as i64, modulus(p));
            let sq = a.mul(&a);
            let root = sq.sqrt().unwrap();
            assert_eq!(root.mul(&root), sq);
        }
    }

    #[proptest]
    fn field_laws(#[strategy(0u64..P61)] x: u64, #[strategy(0u64..P61)] y: u64, #[strategy(0u64..P61)] z: u64) {
        let m = modulus(P61);
        let x = ModInt::from_i64(x as i64, m.clone());
        let y = ModInt::from_i64(y as i64, m.clone());
        let z = ModInt::from_i64(z as i64, m.clone());
        assert_eq!(x.add(&y).sub(&y), x);
        assert_eq!(x.add(&y), y.add(&x));
        assert_eq!(x.mul(&y).mul(&z), x.mul(&y.mul(&z)));
        assert_eq!(x.add(&x.neg()), ModInt::zero(m.clone()));
        if !x.is_zero() {
            assert_eq!(x.div(&x).unwrap(), ModInt::one(m.clone()));
            assert_eq!(x.mul(&x.inv().unwrap()), ModInt::one(m));
        }
    }

    #[test]
    fn hide_round_trip() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let m = modulus(P_1MOD4);
        for _ in 0..256 {
            let (a, hidden) = loop {
                let a = ModInt::random(m.clone(), &mut rng);
                if let Some(hidden) = a.hide_encode(&mut rng) {
                    break (a, hidden);
                }
            };
            assert_eq!(hidden.len(), a.hide_len());
            assert_eq!(ModInt::hide_decode(&hidden, m.clone()).unwrap(), a);
        }
    }

    #[proptest]
    fn hide_decode_accepts_any_string(bytes: [u8; 4]) {
        let m = modulus(P_1MOD4);
        let decoded = ModInt::hide_decode(&bytes, m.clone()).unwrap();
        assert!(decoded.value() < m.as_ref());
    }
}
