//! Cipher suites: a group bundled with a hash function and a sponge XOF.

use core::{fmt, str::FromStr};

use rand_core::{CryptoRng, OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::group::{Bls12381G1, Bls12381G2, Bls12381Gt, Bn256G1, Bn256G2, Bn256Gt};
use crate::group::{Ed25519, Group, P256, P384, P521, Residue512};
use crate::registry::RegistryError;
use crate::sponge::{SecurityLevel, SpongeCipher};

/// A group with the hash function and XOF that go with it.
pub trait Suite: Group {
    /// Hash used for transcripts and key derivation.
    type Hash: Digest + Clone + Send + Sync + 'static;

    /// Security level of the keccak sponge behind [`Suite::xof`].
    fn security_level(&self) -> SecurityLevel;

    fn hash(&self) -> Self::Hash {
        Self::Hash::new()
    }

    /// Extendable output function keyed with `seed`.
    fn xof(&self, seed: &[u8]) -> SpongeCipher {
        SpongeCipher::keccak(self.security_level(), seed)
    }

    /// The operating system random source.
    fn random_stream(&self) -> impl RngCore + CryptoRng {
        OsRng
    }

    /// Hashes `msg` into a scalar by squeezing the suite XOF.
    fn hash_to_scalar(&self, msg: &[u8]) -> Self::Scalar {
        self.pick_scalar(&mut self.xof(msg))
    }
}

macro_rules! suite {
    ($($group:ty => $hash:ty, $level:ident;)*) => {$(
        impl Suite for $group {
            type Hash = $hash;

            fn security_level(&self) -> SecurityLevel {
                SecurityLevel::$level
            }
        }
    )*};
}

suite! {
    Ed25519 => sha2::Sha256, Bits128;
    P256 => sha2::Sha256, Bits128;
    P384 => sha2::Sha384, Bits256;
    P521 => sha2::Sha512, Bits256;
    Residue512 => sha2::Sha256, Bits128;
    Bn256G1 => sha2::Sha256, Bits128;
    Bn256G2 => sha2::Sha256, Bits128;
    Bn256Gt => sha2::Sha256, Bits128;
    Bls12381G1 => sha2::Sha256, Bits128;
    Bls12381G2 => sha2::Sha256, Bits128;
    Bls12381Gt => sha2::Sha256, Bits128;
}

/// Wire identifier of every suite the crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SuiteId {
    #[serde(rename = "Ed25519")]
    Ed25519,
    #[serde(rename = "P256")]
    P256,
    #[serde(rename = "P384")]
    P384,
    #[serde(rename = "P521")]
    P521,
    #[serde(rename = "Residue512")]
    Residue512,
    #[serde(rename = "BN256.G1")]
    Bn256G1,
    #[serde(rename = "BN256.G2")]
    Bn256G2,
    #[serde(rename = "BN256.GT")]
    Bn256Gt,
    #[serde(rename = "BLS12381.G1")]
    Bls12381G1,
    #[serde(rename = "BLS12381.G2")]
    Bls12381G2,
    #[serde(rename = "BLS12381.GT")]
    Bls12381Gt,
}

/// Code that is generic over a suite, run against one chosen at runtime with [`SuiteId::visit`].
pub trait SuiteVisitor {
    type Output;

    fn visit<S: Suite>(self, suite: S) -> Self::Output;
}

impl SuiteId {
    pub const ALL: [SuiteId; 11] = [
        SuiteId::Ed25519,
        SuiteId::P256,
        SuiteId::P384,
        SuiteId::P521,
        SuiteId::Residue512,
        SuiteId::Bn256G1,
        SuiteId::Bn256G2,
        SuiteId::Bn256Gt,
        SuiteId::Bls12381G1,
        SuiteId::Bls12381G2,
        SuiteId::Bls12381Gt,
    ];

    /// Hands the concrete suite behind this id to `visitor`.
    pub fn visit<V: SuiteVisitor>(self, visitor: V) -> V::Output {
        match self {
            SuiteId::Ed25519 => visitor.visit(Ed25519),
            SuiteId::P256 => visitor.visit(P256),
            SuiteId::P384 => visitor.visit(P384),
            SuiteId::P521 => visitor.visit(P521),
            SuiteId::Residue512 => visitor.visit(Residue512),
            SuiteId::Bn256G1 => visitor.visit(Bn256G1::new()),
            SuiteId::Bn256G2 => visitor.visit(Bn256G2::new()),
            SuiteId::Bn256Gt => visitor.visit(Bn256Gt::new()),
            SuiteId::Bls12381G1 => visitor.visit(Bls12381G1::new()),
            SuiteId::Bls12381G2 => visitor.visit(Bls12381G2::new()),
            SuiteId::Bls12381Gt => visitor.visit(Bls12381Gt::new()),
        }
    }

    /// Canonical name, as reported by the group.
    pub fn name(self) -> &'static str {
        struct Name;
        impl SuiteVisitor for Name {
            type Output = &'static str;

            fn visit<S: Suite>(self, suite: S) -> &'static str {
                suite.name()
            }
        }
        self.visit(Name)
    }

    pub fn is_constant_time(self) -> bool {
        struct ConstantTime;
        impl SuiteVisitor for ConstantTime {
            type Output = bool;

            fn visit<S: Suite>(self, suite: S) -> bool {
                suite.is_constant_time()
            }
        }
        self.visit(ConstantTime)
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SuiteId {
    type Err = RegistryError;

    /// Case-insensitive lookup over every known suite, ignoring any registry policy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SuiteId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RegistryError::UnknownSuite(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Scalar as _;

    #[test]
    fn names_round_trip() {
        for id in SuiteId::ALL {
            assert_eq!(id.name().parse::<SuiteId>().unwrap(), id);
            assert_eq!(id.name().to_lowercase().parse::<SuiteId>().unwrap(), id);
            assert_eq!(id.to_string(), id.name());
        }
        assert!(matches!("Curve448".parse::<SuiteId>(), Err(RegistryError::UnknownSuite(_))));
    }

    #[test]
    fn serde_uses_canonical_names() {
        assert_eq!(serde_json::to_string(&SuiteId::Bn256G1).unwrap(), "\"BN256.G1\"");
        assert_eq!(serde_json::from_str::<SuiteId>("\"P256\"").unwrap(), SuiteId::P256);
    }

    #[test]
    fn constant_time_flags() {
        assert!(SuiteId::Ed25519.is_constant_time());
        assert!(SuiteId::P521.is_constant_time());
        assert!(!SuiteId::Residue512.is_constant_time());
        assert!(!SuiteId::Bn256G2.is_constant_time());
    }

    #[test]
    fn hash_to_scalar_is_deterministic() {
        let a = Ed25519.hash_to_scalar(b"message");
        assert_eq!(a, Ed25519.hash_to_scalar(b"message"));
        assert_ne!(a, Ed25519.hash_to_scalar(b"other message"));
        assert!(!a.is_zero());
    }

    #[test]
    fn digest_sizes() {
        assert_eq!(P256.hash().chain_update(b"x").finalize().len(), 32);
        assert_eq!(P384.hash().finalize().len(), 48);
        assert_eq!(P521.hash().finalize().len(), 64);
    }
}
