//! AES-256-GCM envelope encryption.
//!
//! Every blob is sealed under the process-wide [`MasterKey`] with a fresh
//! random 96-bit nonce. The nonce is returned to the caller and persisted in
//! file metadata (hex-encoded) rather than prepended to the ciphertext; the
//! stored object is ciphertext plus tag only.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use thiserror::Error;

use crate::crypto::kdf::MasterKey;

/// GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("plaintext is empty")]
    EmptyPlaintext,
    #[error("encryption failed")]
    EncryptFailed,
    /// Single opaque failure for every decrypt-side problem (malformed
    /// nonce, truncated ciphertext, tag mismatch) so callers cannot probe
    /// which check rejected the input.
    #[error("decryption failed")]
    DecryptFailed,
}

/// Output of [`seal`]: the ciphertext and the nonce it was sealed under.
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// Encrypt `plaintext` under `key` with a freshly drawn random nonce.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Sealed, EnvelopeError> {
    if plaintext.is_empty() {
        return Err(EnvelopeError::EmptyPlaintext);
    }

    let aead = Aes256Gcm::new(key.as_bytes().into());
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = aead
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| EnvelopeError::EncryptFailed)?;

    Ok(Sealed { ciphertext, nonce })
}

/// Decrypt `ciphertext` sealed under `key` with `nonce`.
pub fn open(key: &MasterKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if nonce.len() != NONCE_SIZE || ciphertext.is_empty() {
        return Err(EnvelopeError::DecryptFailed);
    }

    let aead = Aes256Gcm::new(key.as_bytes().into());
    aead.decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| EnvelopeError::DecryptFailed)
}
