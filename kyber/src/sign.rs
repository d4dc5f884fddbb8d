//! Key pairs and Schnorr signatures.
//!
//! A signature is `R ‖ s` with `R = k·G`, `s = k + h·x` and `h` the suite hash of
//! `R ‖ A ‖ msg` mapped to a scalar, where `A = x·G` is the signer's public key. The nonce `k` is
//! derived from the private key and the message with the suite XOF, so signing needs no
//! randomness and never reuses a nonce across messages.

use core::marker::PhantomData;

use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::encoding::EncodingError;
use crate::group::{Element, Group, Scalar};
use crate::suite::Suite;

/// Errors raised while signing or verifying.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum SignatureError {
    /// signature has {actual} bytes, expected {expected}
    InvalidLength {
        /// Expected number of bytes
        expected: usize,
        /// Number of bytes provided
        actual: usize,
    },
    /// malformed signature: {0}
    Malformed(#[from] EncodingError),
    /// public key is the identity element
    InvalidPublicKey,
    /// signature does not verify
    Invalid,
}

/// A signature scheme over the group `G`.
///
/// The trait is object safe so that protocols can carry any scheme behind a `dyn Scheme<G>`.
pub trait Scheme<G: Group>: Send + Sync {
    fn sign(&self, private: &G::Scalar, msg: &[u8]) -> Result<Vec<u8>, SignatureError>;
    fn verify(&self, public: &G::Element, msg: &[u8], sig: &[u8]) -> Result<(), SignatureError>;
}

/// Schnorr signatures over a suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct Schnorr<S> {
    suite: S,
}

impl<S: Suite> Schnorr<S> {
    pub fn new(suite: S) -> Self {
        Self { suite }
    }

    /// Signature length: one element followed by one scalar.
    pub fn signature_len(&self) -> usize {
        self.suite.element_len() + self.suite.scalar_len()
    }

    fn challenge(&self, r: &S::Element, public: &S::Element, msg: &[u8]) -> S::Scalar {
        let mut transcript = r.to_bytes();
        transcript.extend_from_slice(&public.to_bytes());
        transcript.extend_from_slice(msg);
        self.suite.hash_to_scalar(&transcript)
    }
}

impl<S: Suite> Scheme<S> for Schnorr<S> {
    fn sign(&self, private: &S::Scalar, msg: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let public = self.suite.base_mul(private);
        let mut seed = private.to_bytes();
        seed.extend_from_slice(msg);
        let mut k = self.suite.pick_scalar(&mut self.suite.xof(&seed));
        seed.zeroize();

        let r = self.suite.base_mul(&k);
        let h = self.challenge(&r, &public, msg);
        let s = k.add(&h.mul(private));
        k.zeroize();

        let mut sig = r.to_bytes();
        sig.extend_from_slice(&s.to_bytes());
        Ok(sig)
    }

    fn verify(&self, public: &S::Element, msg: &[u8], sig: &[u8]) -> Result<(), SignatureError> {
        let expected = self.signature_len();
        if sig.len() != expected {
            return Err(SignatureError::InvalidLength { expected, actual: sig.len() });
        }
        if public.is_identity() {
            return Err(SignatureError::InvalidPublicKey);
        }
        let (r, s) = sig.split_at(self.suite.element_len());
        let r = self.suite.element_from_bytes(r)?;
        let s = self.suite.scalar_from_bytes(s)?;
        let h = self.challenge(&r, public, msg);
        let lhs = self.suite.base_mul(&s).to_bytes();
        let rhs = r.add(&public.mul(&h)).to_bytes();
        if !bool::from(lhs.as_slice().ct_eq(rhs.as_slice())) {
            return Err(SignatureError::Invalid);
        }
        Ok(())
    }
}

/// A private scalar and its public element.
pub struct KeyPair<G: Group> {
    private: G::Scalar,
    public: G::Element,
    _group: PhantomData<G>,
}

impl<G: Group> Clone for KeyPair<G> {
    fn clone(&self) -> Self {
        Self { private: self.private.clone(), public: self.public.clone(), _group: PhantomData }
    }
}

impl<G: Group> core::fmt::Debug for KeyPair<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair").field("private", &"<redacted>").field("public", &self.public).finish()
    }
}

impl<G: Group> KeyPair<G> {
    /// A fresh random key pair.
    pub fn new<R: RngCore + CryptoRng + ?Sized>(group: &G, rng: &mut R) -> Self {
        Self::from_private(group, group.pick_scalar(rng))
    }

    pub fn from_private(group: &G, private: G::Scalar) -> Self {
        let public = group.base_mul(&private);
        Self { private, public, _group: PhantomData }
    }

    pub fn public(&self) -> &G::Element {
        &self.public
    }

    /// The private scalar.
    ///
    /// NOTE: you should not use this function unless you know what you are doing.
    pub fn expose_secret(&self) -> &G::Scalar {
        &self.private
    }

    pub fn sign(&self, scheme: &dyn Scheme<G>, msg: &[u8]) -> Result<Vec<u8>, SignatureError> {
        scheme.sign(&self.private, msg)
    }
}

impl<G: Group> Drop for KeyPair<G> {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::testing::rng;
    use crate::group::{Bn256G1, Ed25519, Residue512, P384};

    fn round_trip<S: Suite>(suite: S, seed: u64) {
        let mut rng = rng(seed);
        let scheme = Schnorr::new(suite.clone());
        let kp = KeyPair::new(&suite, &mut rng);
        let sig = kp.sign(&scheme, b"Hello World").unwrap();
        assert_eq!(sig.len(), scheme.signature_len());
        scheme.verify(kp.public(), b"Hello World", &sig).unwrap();
        assert_eq!(scheme.verify(kp.public(), b"Hello Word", &sig), Err(SignatureError::Invalid));

        let other = KeyPair::new(&suite, &mut rng);
        assert_eq!(scheme.verify(other.public(), b"Hello World", &sig), Err(SignatureError::Invalid));
    }

    #[test]
    fn signatures_verify_on_every_kind_of_group() {
        round_trip(Ed25519, 1);
        round_trip(P384, 2);
        round_trip(Residue512, 3);
        round_trip(Bn256G1::new(), 4);
    }

    #[test]
    fn signing_is_deterministic() {
        let kp = KeyPair::new(&Ed25519, &mut rng(5));
        let scheme = Schnorr::new(Ed25519);
        assert_eq!(kp.sign(&scheme, b"m").unwrap(), kp.sign(&scheme, b"m").unwrap());
        assert_ne!(kp.sign(&scheme, b"m").unwrap(), kp.sign(&scheme, b"n").unwrap());
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        let kp = KeyPair::new(&Ed25519, &mut rng(6));
        let scheme = Schnorr::new(Ed25519);
        let mut sig = kp.sign(&scheme, b"m").unwrap();
        assert!(matches!(
            scheme.verify(kp.public(), b"m", &sig[1..]),
            Err(SignatureError::InvalidLength { expected: 64, actual: 63 })
        ));
        sig[63] = 0xff;
        assert!(scheme.verify(kp.public(), b"m", &sig).is_err());
        assert_eq!(
            scheme.verify(&Ed25519.identity(), b"m", &sig),
            Err(SignatureError::InvalidPublicKey)
        );
    }

    #[test]
    fn schemes_are_object_safe() {
        let scheme: Box<dyn Scheme<Ed25519>> = Box::new(Schnorr::new(Ed25519));
        let kp = KeyPair::new(&Ed25519, &mut rng(7));
        let sig = kp.sign(scheme.as_ref(), b"boxed").unwrap();
        scheme.verify(kp.public(), b"boxed", &sig).unwrap();
    }

    #[test]
    fn debug_redacts_the_secret() {
        let kp = KeyPair::new(&Ed25519, &mut rng(8));
        let printed = format!("{kp:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(&hex::encode(kp.expose_secret().to_bytes())));
    }
}
