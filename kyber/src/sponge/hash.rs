use super::{Keccak, Sponge};

/// Domain byte of the FIPS 202 SHA-3 functions.
pub const DOMAIN_SHA3: u8 = 0x06;
/// Domain byte of the FIPS 202 SHAKE functions.
pub const DOMAIN_SHAKE: u8 = 0x1f;

/// A sponge hash with a fixed output length.
///
/// With the Keccak sponge at rate 136 and domain [`DOMAIN_SHA3`] this is exactly SHA3-256.
#[derive(Clone)]
pub struct SpongeHash<S: Sponge = Keccak> {
    sponge: S,
    buf: Vec<u8>,
    domain: u8,
    size: usize,
}

impl<S: Sponge> core::fmt::Debug for SpongeHash<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpongeHash")
            .field("rate", &self.sponge.rate())
            .field("domain", &self.domain)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SpongeHash<Keccak> {
    pub fn sha3_256() -> Self {
        Self::new(Keccak::with_rate(136), DOMAIN_SHA3, 32)
    }

    pub fn sha3_512() -> Self {
        Self::new(Keccak::with_rate(72), DOMAIN_SHA3, 64)
    }
}

impl<S: Sponge> SpongeHash<S> {
    pub fn new(sponge: S, domain: u8, size: usize) -> Self {
        let rate = sponge.rate();
        Self { sponge, buf: Vec::with_capacity(rate), domain, size }
    }

    /// Digest size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn block_size(&self) -> usize {
        self.sponge.rate()
    }

    pub fn update(&mut self, mut data: &[u8]) {
        let rate = self.sponge.rate();
        while !data.is_empty() {
            let n = (rate - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..n]);
            data = &data[n..];
            if self.buf.len() == rate {
                self.sponge.transform(&mut [], &self.buf);
                self.buf.clear();
            }
        }
    }

    /// Chainable [`SpongeHash::update`].
    pub fn chain(mut self, data: impl AsRef<[u8]>) -> Self {
        self.update(data.as_ref());
        self
    }

    /// Digest of everything absorbed so far; the hash itself is left untouched.
    pub fn sum(&self) -> Vec<u8> {
        let rate = self.sponge.rate();
        let mut sponge = self.sponge.clone();
        let mut block = vec![0u8; rate];
        block[..self.buf.len()].copy_from_slice(&self.buf);
        block[self.buf.len()] ^= self.domain;
        block[rate - 1] ^= 0x80;

        let mut out = vec![0u8; self.size];
        let mut chunks = out.chunks_mut(rate);
        match chunks.next() {
            Some(first) => sponge.transform(first, &block),
            None => sponge.transform(&mut [], &block),
        }
        for chunk in chunks {
            sponge.transform(chunk, &[]);
        }
        out
    }
}

impl<S: Sponge> std::io::Write for SpongeHash<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sha3::Digest;

    use super::*;

    #[test]
    fn empty_input_matches_sha3_256() {
        assert_eq!(
            hex::encode(SpongeHash::sha3_256().sum()),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn matches_sha3_reference() {
        for len in [0usize, 1, 135, 136, 137, 272, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let ours = SpongeHash::sha3_256().chain(&data).sum();
            let theirs = sha3::Sha3_256::digest(&data);
            assert_eq!(ours, theirs.to_vec(), "length {len}");

            let ours = SpongeHash::sha3_512().chain(&data).sum();
            let theirs = sha3::Sha3_512::digest(&data);
            assert_eq!(ours, theirs.to_vec(), "length {len}");
        }
    }

    #[test]
    fn incremental_updates_and_repeated_sums() {
        let mut h = SpongeHash::sha3_256();
        h.update(b"hello ");
        let partial = h.sum();
        h.update(b"world");
        assert_ne!(partial, h.sum());
        assert_eq!(h.sum(), h.sum());
        assert_eq!(h.sum(), sha3::Sha3_256::digest(b"hello world").to_vec());
    }

    #[test]
    fn long_output_squeezes_several_blocks() {
        let mut shake = sha3::Shake128::default();
        sha3::digest::Update::update(&mut shake, b"xof");
        let mut theirs = vec![0u8; 400];
        sha3::digest::ExtendableOutput::finalize_xof_into(shake, &mut theirs);
        let ours = SpongeHash::new(Keccak::with_rate(168), DOMAIN_SHAKE, 400).chain(b"xof").sum();
        assert_eq!(ours, theirs);
    }
}
