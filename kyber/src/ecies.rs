//! Hybrid encryption of shares to a recipient's long-term public key.
//!
//! The sender draws an ephemeral key pair, derives a Diffie-Hellman point with the recipient's
//! public key and expands it with HKDF-SHA256 into an AES-256-GCM key. The info string binds the
//! key to the suite, the caller's context, the ephemeral key and the recipient. Every key is
//! used for exactly one message, so the nonce is fixed to zero. The ephemeral key is signed by
//! the sender's long-term key so the recipient knows who encrypted the share.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::SimpleHkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::group::{Element, Group};
use crate::marshal::{Decoder, Encoder, Marshal, MarshalError};
use crate::sign::{KeyPair, Scheme, SignatureError};

/// AES-GCM nonce; each key encrypts a single message.
const NONCE: [u8; 12] = [0u8; 12];

/// An Error that can occur during the encryption or decryption of a share.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum EciesError {
    /// ephemeral key signature: {0}
    Signature(#[from] SignatureError),
    /// the shared Diffie-Hellman point is the identity
    DegenerateKey,
    /// key derivation failed
    KeyDerivation,
    /// authenticated encryption failed
    Encryption,
    /// ciphertext does not authenticate under the derived key
    Decryption,
}

/// A share encrypted to one recipient.
pub struct EncryptedShare<G: Group> {
    /// The ephemeral public key used in the encryption
    pub ephemeral: G::Element,
    /// The sender's signature over the ephemeral key
    pub signature: Vec<u8>,
    /// AES-GCM ciphertext and tag
    pub ciphertext: Vec<u8>,
}

impl<G: Group> Clone for EncryptedShare<G> {
    fn clone(&self) -> Self {
        Self { ephemeral: self.ephemeral.clone(), signature: self.signature.clone(), ciphertext: self.ciphertext.clone() }
    }
}

impl<G: Group> PartialEq for EncryptedShare<G> {
    fn eq(&self, other: &Self) -> bool {
        self.ephemeral == other.ephemeral && self.signature == other.signature && self.ciphertext == other.ciphertext
    }
}

impl<G: Group> core::fmt::Debug for EncryptedShare<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EncryptedShare")
            .field("ephemeral", &self.ephemeral)
            .field("signature", &hex::encode(&self.signature))
            .field("ciphertext", &hex::encode(&self.ciphertext))
            .finish()
    }
}

impl<G: Group> Marshal<G> for EncryptedShare<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.element(&self.ephemeral).var_bytes(&self.signature)?.var_bytes(&self.ciphertext)?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        Ok(Self { ephemeral: dec.element()?, signature: dec.var_bytes()?, ciphertext: dec.var_bytes()? })
    }
}

/// Derives the AES key shared by `ephemeral` and `recipient` from the DH point `dh`.
fn derive_key<G: Group>(
    group: &G,
    dh: &G::Element,
    ephemeral: &G::Element,
    recipient: &G::Element,
    context: &[u8],
) -> Result<Zeroizing<[u8; 32]>, EciesError> {
    if dh.is_identity() {
        return Err(EciesError::DegenerateKey);
    }
    let mut ikm = dh.to_bytes();
    let mut info = group.name().as_bytes().to_vec();
    info.extend_from_slice(context);
    info.extend_from_slice(&ephemeral.to_bytes());
    info.extend_from_slice(&recipient.to_bytes());

    let mut key = Zeroizing::new([0u8; 32]);
    let result = SimpleHkdf::<Sha256>::new(None, &ikm).expand(&info, &mut key[..]);
    ikm.zeroize();
    result.map_err(|_| EciesError::KeyDerivation)?;
    Ok(key)
}

/// Encrypts `plaintext` to `recipient`, signing the ephemeral key with `sender`'s key.
pub fn encrypt<G, R>(
    group: &G,
    auth: &dyn Scheme<G>,
    sender: &G::Scalar,
    recipient: &G::Element,
    context: &[u8],
    plaintext: &[u8],
    rng: &mut R,
) -> Result<EncryptedShare<G>, EciesError>
where
    G: Group,
    R: RngCore + CryptoRng + ?Sized,
{
    let eph = KeyPair::new(group, rng);
    let ephemeral = eph.public().clone();
    let dh = recipient.mul(eph.expose_secret());
    let key = derive_key(group, &dh, &ephemeral, recipient, context)?;

    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| EciesError::KeyDerivation)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&NONCE), Payload { msg: plaintext, aad: context })
        .map_err(|_| EciesError::Encryption)?;
    let signature = auth.sign(sender, &ephemeral.to_bytes())?;
    Ok(EncryptedShare { ephemeral, signature, ciphertext })
}

/// Checks the sender's signature on the ephemeral key and decrypts the share.
pub fn decrypt<G: Group>(
    group: &G,
    auth: &dyn Scheme<G>,
    sender: &G::Element,
    recipient: &G::Scalar,
    context: &[u8],
    share: &EncryptedShare<G>,
) -> Result<Zeroizing<Vec<u8>>, EciesError> {
    auth.verify(sender, &share.ephemeral.to_bytes(), &share.signature)?;
    let recipient_public = group.base_mul(recipient);
    let dh = share.ephemeral.mul(recipient);
    let key = derive_key(group, &dh, &share.ephemeral, &recipient_public, context)?;

    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| EciesError::KeyDerivation)?;
    cipher
        .decrypt(Nonce::from_slice(&NONCE), Payload { msg: &share.ciphertext, aad: context })
        .map(Zeroizing::new)
        .map_err(|_| EciesError::Decryption)
}
