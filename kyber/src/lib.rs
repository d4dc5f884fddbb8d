#![deny(future_incompatible, nonstandard_style, rust_2018_idioms, unsafe_code)]
#![warn(unused, unused_crate_dependencies)]

//! Cryptographic building blocks over abstract prime-order groups.
//!
//! Protocols are written once against the [`group::Group`] and [`suite::Suite`] traits and run
//! on any backend: Ed25519, the NIST P-256/P-384/P-521 curves, a quadratic residue group modulo
//! a 512-bit safe prime, or the source and target groups of the BN256 and BLS12-381 pairings.
//!
//! # Features
//!
//! - Fixed-width, hiding and data-embedding encodings of scalars and elements
//! - Keccak sponge ciphers, hashes and extendable output functions
//! - Generic marshalling of composite values
//! - Schnorr signatures and ECIES share encryption
//! - Pedersen verifiable secret sharing
//! - Pedersen distributed key generation and resharing, with fast sync and eviction of
//!   misbehaving parties
//! - Asynchronous, transport agnostic protocol driver
//!
//! # Version Compatibility
//!
//! This crate is compatible with Rust 1.80.0 and later.

/// Integers modulo a fixed modulus
pub mod modint;

/// Byte orders and fixed-width encoding errors
pub mod encoding;

/// Groups, scalars and elements
pub mod group;

/// Sponges, ciphers and hashes
pub mod sponge;

/// Encoding of composite values
pub mod marshal;

/// Cipher suites
pub mod suite;

/// Suite lookup by name
pub mod registry;

/// Working with Polynomials.
pub mod poly;

/// Signing and Signatures
pub mod sign;

/// Encryption of shares
pub mod ecies;

/// Verifiable secret sharing
pub mod vss;

/// Distributed key generation and resharing
pub mod dkg;

/// Progress tracing
pub mod trace;

// Re-exports for convenience
pub use dkg::{Config, DistKeyGenerator, DistKeyShare, DkgError, DkgResult, Node, Phase};
pub use group::{Element, Group, Scalar};
pub use registry::Registry;
pub use sign::{KeyPair, Schnorr, Scheme};
pub use suite::{Suite, SuiteId};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_SUPPORTED_RUST_VERSION: &str = env!("CARGO_PKG_RUST_VERSION");

// used for benchmarking
#[cfg(test)]
#[allow(unused)]
pub use criterion as _;
