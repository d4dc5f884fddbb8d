//! Sponge functions and the ciphers, hashes and random streams derived from them.
//!
//! Every randomness, hash and keystream in the crate bottoms out in a [`Sponge`]: a permutation
//! over a state split into `rate` bytes that are absorbed and squeezed, and `capacity` bytes
//! that are never exposed.

/// Duplex stream cipher and XOF.
pub mod cipher;
/// Fixed output length sponge hash.
pub mod hash;
/// The Keccak-f\[1600\] permutation.
pub mod keccak;

pub use cipher::SpongeCipher;
pub use hash::SpongeHash;
pub use keccak::{Keccak, SecurityLevel};

/// A sponge permutation.
pub trait Sponge: Clone + Send + Sync + 'static {
    /// Bytes absorbed and squeezed per block.
    fn rate(&self) -> usize;
    /// Bytes of hidden state.
    fn capacity(&self) -> usize;
    /// XORs up to [`Sponge::rate`] bytes of `src` into the state, applies the permutation, then
    /// writes up to [`Sponge::rate`] bytes of the new state into `dst`.
    fn transform(&mut self, dst: &mut [u8], src: &[u8]);
}
