use serde::{Deserialize, Serialize};

use super::Sponge;

const STATE_BYTES: usize = 200;

/// Security level of a Keccak sponge; the capacity is twice the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    Bits128,
    Bits256,
    Bits512,
}

impl SecurityLevel {
    /// Rate in bytes: `200 - 2 · level / 8`.
    pub const fn rate(self) -> usize {
        match self {
            SecurityLevel::Bits128 => 168,
            SecurityLevel::Bits256 => 136,
            SecurityLevel::Bits512 => 72,
        }
    }
}

/// The Keccak-f\[1600\] sponge, lanes little-endian.
#[derive(Clone)]
pub struct Keccak {
    lanes: [u64; 25],
    rate: usize,
}

impl core::fmt::Debug for Keccak {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keccak").field("rate", &self.rate).finish_non_exhaustive()
    }
}

impl Keccak {
    pub fn new(level: SecurityLevel) -> Self {
        Self::with_rate(level.rate())
    }

    /// Sponge with an explicit rate in bytes, e.g. 136 for SHA3-256.
    ///
    /// The rate is rounded down to whole lanes and kept below the state size.
    pub fn with_rate(rate: usize) -> Self {
        let rate = (rate / 8).clamp(1, 24) * 8;
        Self { lanes: [0; 25], rate }
    }
}

impl Sponge for Keccak {
    fn rate(&self) -> usize {
        self.rate
    }

    fn capacity(&self) -> usize {
        STATE_BYTES - self.rate
    }

    fn transform(&mut self, dst: &mut [u8], src: &[u8]) {
        for (i, b) in src.iter().take(self.rate).enumerate() {
            self.lanes[i / 8] ^= u64::from(*b) << (8 * (i % 8));
        }
        tiny_keccak::keccakf(&mut self.lanes);
        for (i, d) in dst.iter_mut().take(self.rate).enumerate() {
            *d = (self.lanes[i / 8] >> (8 * (i % 8))) as u8;
        }
    }
}
