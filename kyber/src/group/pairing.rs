//! Pairing-friendly curves built on arkworks.
//!
//! Each curve yields three groups sharing one scalar field: the source groups G1 and G2 and the
//! target group GT, linked by [`pair`]. Points use the arkworks compressed encoding and decoding
//! checks subgroup membership. None of these backends are constant time.

use core::{fmt, marker::PhantomData};

use ark_bls12_381::Bls12_381;
use ark_bn254::Bn254;
use ark_ec::{
    pairing::{Pairing, PairingOutput},
    AffineRepr, CurveGroup, Group as _,
};
use ark_ff::{BigInteger, Field, One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand_core::{CryptoRng, RngCore};

use super::{Element, Group, Scalar};
use crate::encoding::{check_len, ByteOrder, EncodingError};

/// Curve specific details the generic pairing groups need.
pub trait PairingCurve: Pairing {
    const G1_NAME: &'static str;
    const G2_NAME: &'static str;
    const GT_NAME: &'static str;
    /// Payload bytes a G1 element can carry; zero when G1 has a cofactor.
    const G1_EMBED_LEN: usize;
    /// Bit length of the base field of G1.
    const G1_FIELD_BITS: usize;

    /// Lifts a canonical big-endian x coordinate onto G1.
    fn g1_from_x(x: &[u8], greatest: bool) -> Option<Self::G1Affine>;
    /// Big-endian x coordinate, `None` for the point at infinity.
    fn g1_x(p: &Self::G1Affine) -> Option<Vec<u8>>;
}

impl PairingCurve for Bn254 {
    const G1_NAME: &'static str = "BN256.G1";
    const G2_NAME: &'static str = "BN256.G2";
    const GT_NAME: &'static str = "BN256.GT";
    const G1_EMBED_LEN: usize = (254 - 8 - 8) / 8;
    const G1_FIELD_BITS: usize = 254;

    fn g1_from_x(x: &[u8], greatest: bool) -> Option<ark_bn254::G1Affine> {
        let fx = ark_bn254::Fq::from_be_bytes_mod_order(x);
        if fx.into_bigint().to_bytes_be() != x {
            return None;
        }
        // cofactor one: every curve point is in G1
        ark_bn254::G1Affine::get_point_from_x_unchecked(fx, greatest)
    }

    fn g1_x(p: &ark_bn254::G1Affine) -> Option<Vec<u8>> {
        (!p.infinity).then(|| p.x.into_bigint().to_bytes_be())
    }
}

impl PairingCurve for Bls12_381 {
    const G1_NAME: &'static str = "BLS12381.G1";
    const G2_NAME: &'static str = "BLS12381.G2";
    const GT_NAME: &'static str = "BLS12381.GT";
    const G1_EMBED_LEN: usize = 0;
    const G1_FIELD_BITS: usize = 381;

    fn g1_from_x(_x: &[u8], _greatest: bool) -> Option<ark_bls12_381::G1Affine> {
        None
    }

    fn g1_x(_p: &ark_bls12_381::G1Affine) -> Option<Vec<u8>> {
        None
    }
}

fn ark_bytes<T: CanonicalSerialize>(v: &T) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.compressed_size());
    // writing into a Vec cannot fail
    let _ = v.serialize_compressed(&mut buf);
    buf
}

/// Scalar of a pairing curve, big-endian on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PairingScalar<E: Pairing>(E::ScalarField);

impl<E: Pairing> fmt::Debug for PairingScalar<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairingScalar({})", hex::encode(self.0.into_bigint().to_bytes_be()))
    }
}

impl<E: Pairing> PairingScalar<E> {
    pub fn inner(&self) -> &E::ScalarField {
        &self.0
    }
}

impl<E: Pairing> zeroize::Zeroize for PairingScalar<E> {
    fn zeroize(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.0);
    }
}

impl<E: Pairing> Scalar for PairingScalar<E> {
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
        self.0.inverse().map(Self)
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.into_bigint().to_bytes_be()
    }
}

fn scalar_len<E: Pairing>() -> usize {
    (E::ScalarField::MODULUS_BIT_SIZE as usize + 7) / 8
}

fn scalar_from_i64<E: Pairing>(v: i64) -> PairingScalar<E> {
    let abs = E::ScalarField::from(v.unsigned_abs());
    PairingScalar(if v < 0 { -abs } else { abs })
}

fn scalar_from_bytes<E: Pairing>(bytes: &[u8]) -> Result<PairingScalar<E>, EncodingError> {
    check_len(bytes, scalar_len::<E>())?;
    let s = E::ScalarField::from_be_bytes_mod_order(bytes);
    if s.into_bigint().to_bytes_be() != bytes {
        return Err(EncodingError::OutOfRange);
    }
    Ok(PairingScalar(s))
}

macro_rules! pairing_group {
    (
        $(#[$meta:meta])*
        $group:ident, $point:ident, $name:ident,
        inner = $inner:ty, generator = $gen:expr, identity = $id:expr $(,)?
    ) => {
        $(#[$meta])*
        pub struct $group<E>(PhantomData<E>);

        impl<E> $group<E> {
            pub const fn new() -> Self {
                Self(PhantomData)
            }
        }

        // the curve marker types are not `Default`, so these are written without bounds
        impl<E> Default for $group<E> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<E> Clone for $group<E> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<E> Copy for $group<E> {}

        impl<E> PartialEq for $group<E> {
            fn eq(&self, _: &Self) -> bool {
                true
            }
        }

        impl<E> Eq for $group<E> {}

        impl<E: PairingCurve> fmt::Debug for $group<E> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(E::$name)
            }
        }

        #[derive(Clone, Copy, PartialEq, Eq)]
        pub struct $point<E: Pairing>($inner);

        impl<E: PairingCurve> fmt::Debug for $point<E> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($point), hex::encode(self.to_bytes()))
            }
        }

        impl<E: Pairing> $point<E> {
            pub fn inner(&self) -> &$inner {
                &self.0
            }
        }

        impl<E: PairingCurve> Group for $group<E> {
            type Scalar = PairingScalar<E>;
            type Element = $point<E>;

            fn name(&self) -> &'static str {
                E::$name
            }

            fn scalar_len(&self) -> usize {
                scalar_len::<E>()
            }

            fn element_len(&self) -> usize {
                self.identity().to_bytes().len()
            }

            fn scalar_order(&self) -> ByteOrder {
                ByteOrder::BigEndian
            }

            fn order_bits(&self) -> usize {
                E::ScalarField::MODULUS_BIT_SIZE as usize
            }

            fn is_constant_time(&self) -> bool {
                false
            }

            fn scalar_zero(&self) -> PairingScalar<E> {
                PairingScalar(E::ScalarField::zero())
            }

            fn scalar_one(&self) -> PairingScalar<E> {
                PairingScalar(E::ScalarField::one())
            }

            fn scalar_from_i64(&self, v: i64) -> PairingScalar<E> {
                scalar_from_i64::<E>(v)
            }

            fn scalar_from_bytes(&self, bytes: &[u8]) -> Result<PairingScalar<E>, EncodingError> {
                scalar_from_bytes::<E>(bytes)
            }

            fn identity(&self) -> $point<E> {
                $point($id)
            }

            fn generator(&self) -> $point<E> {
                $point($gen)
            }

            fn element_from_bytes(&self, bytes: &[u8]) -> Result<$point<E>, EncodingError> {
                check_len(bytes, self.element_len())?;
                $point::<E>::decode(bytes)
            }

            fn embed_len(&self) -> usize {
                $point::<E>::EMBED_LEN
            }

            fn embed<'a, R: RngCore + CryptoRng + ?Sized>(&self, data: &'a [u8], rng: &mut R) -> ($point<E>, &'a [u8]) {
                $point::<E>::embed(self, data, rng)
            }

            fn pick_element<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> $point<E> {
                self.generator().mul(&self.pick_scalar(rng))
            }
        }
    };
}

pairing_group!(
    /// Source group G1.
    PairingG1, G1Point, G1_NAME,
    inner = E::G1, generator = E::G1::generator(), identity = E::G1::zero(),
);

pairing_group!(
    /// Source group G2.
    PairingG2, G2Point, G2_NAME,
    inner = E::G2, generator = E::G2::generator(), identity = E::G2::zero(),
);

pairing_group!(
    /// Target group GT, written additively.
    PairingGt, GtPoint, GT_NAME,
    inner = PairingOutput<E>, generator = PairingOutput::<E>::generator(), identity = PairingOutput::<E>::zero(),
);

macro_rules! curve_element {
    ($point:ident) => {
        impl<E: PairingCurve> Element for $point<E> {
            type Scalar = PairingScalar<E>;

            fn add(&self, rhs: &Self) -> Self {
                Self(self.0 + rhs.0)
            }

            fn sub(&self, rhs: &Self) -> Self {
                Self(self.0 - rhs.0)
            }

            fn neg(&self) -> Self {
                Self(-self.0)
            }

            fn mul(&self, s: &PairingScalar<E>) -> Self {
                Self(self.0 * s.0)
            }

            fn is_identity(&self) -> bool {
                self.0.is_zero()
            }

            fn to_bytes(&self) -> Vec<u8> {
                ark_bytes(&self.0.into_affine())
            }

            fn data(&self) -> Result<Vec<u8>, EncodingError> {
                self.extract()
            }
        }
    };
}

curve_element!(G1Point);
curve_element!(G2Point);

impl<E: PairingCurve> G1Point<E> {
    const EMBED_LEN: usize = E::G1_EMBED_LEN;

    fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        E::G1Affine::deserialize_compressed(bytes)
            .map(|p| Self(p.into_group()))
            .map_err(|_| EncodingError::NotOnCurve)
    }

    fn x_len() -> usize {
        (E::G1_FIELD_BITS + 7) / 8
    }

    fn embed<'a, R: RngCore + CryptoRng + ?Sized>(
        group: &PairingG1<E>,
        data: &'a [u8],
        rng: &mut R,
    ) -> (Self, &'a [u8]) {
        if Self::EMBED_LEN == 0 {
            return (group.pick_element(rng), data);
        }
        let len = Self::x_len();
        let dl = data.len().min(Self::EMBED_LEN);
        let mut x = vec![0u8; len];
        loop {
            rng.fill_bytes(&mut x);
            x[0] &= 0xff >> (len * 8 - E::G1_FIELD_BITS);
            x[len - 1] = dl as u8;
            x[len - 1 - dl..len - 1].copy_from_slice(&data[..dl]);
            if let Some(p) = E::g1_from_x(&x, rng.next_u32() & 1 == 1) {
                return (Self(p.into_group()), &data[dl..]);
            }
        }
    }

    fn extract(&self) -> Result<Vec<u8>, EncodingError> {
        let x = E::g1_x(&self.0.into_affine()).ok_or(EncodingError::EmbeddedLength(0))?;
        let len = x.len();
        let dl = usize::from(x[len - 1]);
        if dl > Self::EMBED_LEN {
            return Err(EncodingError::EmbeddedLength(dl));
        }
        Ok(x[len - 1 - dl..len - 1].to_vec())
    }
}

impl<E: PairingCurve> G2Point<E> {
    const EMBED_LEN: usize = 0;

    fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        E::G2Affine::deserialize_compressed(bytes)
            .map(|p| Self(p.into_group()))
            .map_err(|_| EncodingError::NotOnCurve)
    }

    fn embed<'a, R: RngCore + CryptoRng + ?Sized>(
        group: &PairingG2<E>,
        data: &'a [u8],
        rng: &mut R,
    ) -> (Self, &'a [u8]) {
        (group.pick_element(rng), data)
    }

    fn extract(&self) -> Result<Vec<u8>, EncodingError> {
        Err(EncodingError::EmbeddedLength(0))
    }
}

impl<E: PairingCurve> Element for GtPoint<E> {
    type Scalar = PairingScalar<E>;

    fn add(&self, rhs: &Self) -> Self {
        Self(self.0 + rhs.0)
    }

    fn sub(&self, rhs: &Self) -> Self {
        Self(self.0 - rhs.0)
    }

    fn neg(&self) -> Self {
        Self(-self.0)
    }

    fn mul(&self, s: &PairingScalar<E>) -> Self {
        Self(self.0 * s.0)
    }

    fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    fn to_bytes(&self) -> Vec<u8> {
        ark_bytes(&self.0)
    }

    fn data(&self) -> Result<Vec<u8>, EncodingError> {
        Err(EncodingError::EmbeddedLength(0))
    }
}

impl<E: PairingCurve> GtPoint<E> {
    const EMBED_LEN: usize = 0;

    fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        let v = PairingOutput::<E>::deserialize_compressed(bytes).map_err(|_| EncodingError::NotOnCurve)?;
        // the r-th power of an element of the order-r subgroup is one
        if !v.0.pow(E::ScalarField::MODULUS).is_one() {
            return Err(EncodingError::NotInSubgroup);
        }
        Ok(Self(v))
    }

    fn embed<'a, R: RngCore + CryptoRng + ?Sized>(
        group: &PairingGt<E>,
        data: &'a [u8],
        rng: &mut R,
    ) -> (Self, &'a [u8]) {
        (group.pick_element(rng), data)
    }
}

/// The bilinear map `e: G1 × G2 → GT`.
pub fn pair<E: PairingCurve>(p: &G1Point<E>, q: &G2Point<E>) -> GtPoint<E> {
    GtPoint(E::pairing(p.0, q.0))
}

pub type Bn256G1 = PairingG1<Bn254>;
pub type Bn256G2 = PairingG2<Bn254>;
pub type Bn256Gt = PairingGt<Bn254>;
pub type Bls12381G1 = PairingG1<Bls12_381>;
pub type Bls12381G2 = PairingG2<Bls12_381>;
pub type Bls12381Gt = PairingGt<Bls12_381>;
