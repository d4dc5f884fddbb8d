use rand_core::{CryptoRng, RngCore};

use super::{Keccak, SecurityLevel, Sponge};

/// Default padding byte that terminates a message.
const PAD: u8 = 0x7f;

/// Domain tag absorbed ahead of the index when forking a child cipher.
const DOMAIN_FORK: u8 = 0x10;

/// A duplex sponge cipher.
///
/// Data is XORed against the rate part of the sponge state; whatever is encrypted or decrypted
/// is absorbed, so both sides of a conversation evolve identically as long as they process the
/// same messages with the same `more` flags. A message ends (and gets padded) on the first call
/// with `more == false`. With an empty source the cipher squeezes: the output is keystream and
/// the consumed state is zeroed, which is what makes it usable as an XOF or random stream.
#[derive(Clone)]
pub struct SpongeCipher<S: Sponge = Keccak> {
    sponge: S,
    buf: Vec<u8>,
    scratch: Vec<u8>,
    pos: usize,
    pad: u8,
}

impl<S: Sponge> core::fmt::Debug for SpongeCipher<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpongeCipher").field("rate", &self.buf.len()).finish_non_exhaustive()
    }
}

impl SpongeCipher<Keccak> {
    /// Keccak based cipher keyed with `key`.
    pub fn keccak(level: SecurityLevel, key: &[u8]) -> Self {
        Self::new(Keccak::new(level), key)
    }
}

impl<S: Sponge> SpongeCipher<S> {
    /// Creates a cipher over `sponge` and absorbs `key` as its first message.
    pub fn new(sponge: S, key: &[u8]) -> Self {
        Self::with_pad(sponge, key, PAD)
    }

    pub fn with_pad(sponge: S, key: &[u8], pad: u8) -> Self {
        let rate = sponge.rate();
        let mut cipher = Self { sponge, buf: vec![0; rate], scratch: vec![0; rate], pos: 0, pad };
        cipher.absorb(key, false);
        cipher
    }

    pub fn rate(&self) -> usize {
        self.buf.len()
    }

    /// Encrypts `src` into `dst`.
    ///
    /// `dst` and `src` may differ in length: an empty `src` squeezes `dst.len()` bytes, an empty
    /// `dst` absorbs `src` without producing output.
    pub fn encrypt(&mut self, dst: &mut [u8], src: &[u8], more: bool) {
        let rate = self.rate();
        let (mut d, mut s) = (0, 0);
        while d < dst.len() || s < src.len() {
            if self.pos == rate {
                self.permute();
            }
            let n = (rate - self.pos).min((dst.len() - d).max(src.len() - s));
            for i in 0..n {
                let p = self.pos + i;
                let plain = src.get(s + i).copied();
                if let Some(out) = dst.get_mut(d + i) {
                    *out = self.buf[p] ^ plain.unwrap_or(0);
                }
                self.buf[p] = plain.unwrap_or(0);
            }
            d = (d + n).min(dst.len());
            s = (s + n).min(src.len());
            self.pos += n;
        }
        if !more {
            self.pad_message();
        }
    }

    /// Decrypts `src` into `dst`; the inverse of [`SpongeCipher::encrypt`] on a cipher in the
    /// same state.
    pub fn decrypt(&mut self, dst: &mut [u8], src: &[u8], more: bool) {
        let rate = self.rate();
        let (mut d, mut s) = (0, 0);
        while d < dst.len() || s < src.len() {
            if self.pos == rate {
                self.permute();
            }
            let n = (rate - self.pos).min((dst.len() - d).max(src.len() - s));
            for i in 0..n {
                let p = self.pos + i;
                let plain = match src.get(s + i) {
                    Some(c) if d + i < dst.len() => self.buf[p] ^ c,
                    Some(c) => *c,
                    None => 0,
                };
                if let Some(out) = dst.get_mut(d + i) {
                    *out = if s + i < src.len() { plain } else { self.buf[p] };
                }
                self.buf[p] = plain;
            }
            d = (d + n).min(dst.len());
            s = (s + n).min(src.len());
            self.pos += n;
        }
        if !more {
            self.pad_message();
        }
    }

    /// Absorbs `src` with no output.
    pub fn absorb(&mut self, src: &[u8], more: bool) {
        self.encrypt(&mut [], src, more);
    }

    /// Squeezes `dst.len()` bytes of keystream.
    pub fn squeeze(&mut self, dst: &mut [u8], more: bool) {
        self.encrypt(dst, &[], more);
    }

    /// XORs `src` with keystream into `dst` without absorbing anything.
    ///
    /// Only `min(dst.len(), src.len())` bytes are processed.
    pub fn xor_key_stream(&mut self, dst: &mut [u8], src: &[u8]) {
        let rate = self.rate();
        let len = dst.len().min(src.len());
        let mut done = 0;
        while done < len {
            if self.pos == rate {
                self.permute();
            }
            let n = (rate - self.pos).min(len - done);
            for i in 0..n {
                dst[done + i] = src[done + i] ^ self.buf[self.pos + i];
            }
            self.pos += n;
            done += n;
        }
    }

    /// Splits the cipher into `n` independent children.
    ///
    /// The parent absorbs a fork tag with index 0 so it never repeats any child's stream; child
    /// `i` is the parent's state with index `i + 1` absorbed.
    pub fn fork(&mut self, n: usize) -> Vec<Self> {
        let children = (0..n)
            .map(|i| {
                let mut child = self.clone();
                child.special(DOMAIN_FORK, i as u64 + 1);
                child
            })
            .collect();
        self.special(DOMAIN_FORK, 0);
        children
    }

    /// A fresh cipher keyed from `rate` bytes of this one's keystream.
    pub fn reseed(&mut self) -> Self {
        let mut key = vec![0u8; self.rate()];
        self.squeeze(&mut key, false);
        let child = Self::with_pad(self.sponge.clone(), &key, self.pad);
        zeroize::Zeroize::zeroize(&mut key);
        child
    }

    fn special(&mut self, domain: u8, index: u64) {
        let mut msg = [0u8; 9];
        msg[0] = domain;
        msg[1..].copy_from_slice(&index.to_le_bytes());
        self.absorb(&msg, false);
    }

    fn pad_message(&mut self) {
        let rate = self.rate();
        if self.pos == rate {
            self.permute();
        }
        self.buf[self.pos] = self.pad;
        self.buf[self.pos + 1..].fill(0);
        self.buf[rate - 1] ^= 0x80;
        self.permute();
    }

    fn permute(&mut self) {
        self.scratch.copy_from_slice(&self.buf);
        self.sponge.transform(&mut self.buf, &self.scratch);
        self.pos = 0;
    }
}

impl<S: Sponge> RngCore for SpongeCipher<S> {
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.squeeze(dest, true);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl<S: Sponge> CryptoRng for SpongeCipher<S> {}

impl<S: Sponge> Drop for SpongeCipher<S> {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.buf);
        zeroize::Zeroize::zeroize(&mut self.scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(key: &[u8]) -> SpongeCipher {
        SpongeCipher::keccak(SecurityLevel::Bits256, key)
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        let msg = b"a message spanning more than a single rate block of the keccak sponge, \
                    which is 136 bytes wide at the 256-bit security level, so it has to be long";
        let (mut alice, mut bob) = (cipher(b"key"), cipher(b"key"));
        let mut ct = vec![0u8; msg.len()];
        alice.encrypt(&mut ct, msg, false);
        assert_ne!(&ct[..], &msg[..]);
        let mut pt = vec![0u8; ct.len()];
        bob.decrypt(&mut pt, &ct, false);
        assert_eq!(&pt[..], &msg[..]);

        // both sides stay in lockstep
        let (mut t1, mut t2) = ([0u8; 16], [0u8; 16]);
        alice.squeeze(&mut t1, false);
        bob.squeeze(&mut t2, false);
        assert_eq!(t1, t2);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let msg = [7u8; 300];
        let mut a = cipher(b"k");
        let mut one = vec![0u8; 300];
        a.encrypt(&mut one, &msg, false);

        let mut b = cipher(b"k");
        let mut parts = vec![0u8; 300];
        b.encrypt(&mut parts[..100], &msg[..100], true);
        b.encrypt(&mut parts[100..250], &msg[100..250], true);
        b.encrypt(&mut parts[250..], &msg[250..], false);
        assert_eq!(one, parts);
    }

    #[test]
    fn split_messages_without_more_differ_from_one_shot() {
        let msg = [7u8; 300];
        let mut a = cipher(b"k");
        let mut one = vec![0u8; 300];
        a.encrypt(&mut one, &msg, false);

        let mut b = cipher(b"k");
        let mut parts = vec![0u8; 300];
        b.encrypt(&mut parts[..150], &msg[..150], false);
        b.encrypt(&mut parts[150..], &msg[150..], false);
        assert_ne!(one, parts);
    }

    #[test]
    fn keys_and_messages_separate_streams() {
        let (mut a, mut b) = ([0u8; 32], [0u8; 32]);
        cipher(b"one").squeeze(&mut a, false);
        cipher(b"two").squeeze(&mut b, false);
        assert_ne!(a, b);

        let mut c = cipher(b"one");
        c.absorb(b"context", false);
        let mut d = [0u8; 32];
        c.squeeze(&mut d, false);
        assert_ne!(a, d);
    }

    #[test]
    fn forks_are_distinct_and_deterministic() {
        let mut parent = cipher(b"seed");
        let mut children = parent.fork(3);
        let mut outs: Vec<[u8; 32]> = children
            .iter_mut()
            .map(|c| {
                let mut o = [0u8; 32];
                c.fill_bytes(&mut o);
                o
            })
            .collect();
        let mut p = [0u8; 32];
        parent.fill_bytes(&mut p);
        outs.push(p);
        for i in 0..outs.len() {
            for j in i + 1..outs.len() {
                assert_ne!(outs[i], outs[j]);
            }
        }

        let mut again = cipher(b"seed").fork(3);
        let mut o = [0u8; 32];
        again[1].fill_bytes(&mut o);
        assert_eq!(o, outs[1]);
    }

    #[test]
    fn reseed_diverges_from_parent() {
        let mut parent = cipher(b"seed");
        let mut child = parent.reseed();
        let (mut a, mut b) = ([0u8; 32], [0u8; 32]);
        parent.fill_bytes(&mut a);
        child.fill_bytes(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn key_stream_is_an_involution() {
        let data = [42u8; 200];
        let mut enc = vec![0u8; 200];
        cipher(b"ks").xor_key_stream(&mut enc, &data);
        let mut dec = vec![0u8; 200];
        cipher(b"ks").xor_key_stream(&mut dec, &enc);
        assert_eq!(&dec[..], &data[..]);
    }

    #[test]
    fn rng_is_reproducible() {
        let (mut a, mut b) = (cipher(b"rng"), cipher(b"rng"));
        assert_eq!(a.next_u64(), b.next_u64());
        assert_eq!(a.next_u32(), b.next_u32());
    }
}
