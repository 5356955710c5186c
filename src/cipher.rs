//! Encryption at rest for stored blobs.
//!
//! # Envelope format
//!
//! ```text
//! +----------------------+-------------------------------+
//! | nonce (24 bytes)     | XChaCha20(key, nonce) ^ data  |
//! +----------------------+-------------------------------+
//! ```
//!
//! - **Cipher**: XChaCha20 stream cipher. The 192-bit nonce is drawn from the
//!   OS RNG on every call, so concurrent uploads never need to coordinate.
//! - **Key**: SHA-256 of the configured secret.
//! - **No authentication**: decrypting with the wrong key, or a corrupted
//!   envelope, returns bytes of the same length and never an error.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{Key, XChaCha20, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::StoreError;

/// Nonce length for XChaCha20 (24 bytes)
pub const NONCE_LEN: usize = 24;

/// Key length (32 bytes)
pub const KEY_LEN: usize = 32;

/// Process-wide encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey([u8; KEY_LEN]);

impl CipherKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a key from arbitrary secret material.
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        Self(key)
    }

    fn as_key(&self) -> &Key {
        Key::from_slice(&self.0)
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// Encrypt `plaintext` into a self-contained envelope.
pub fn encrypt(plaintext: &[u8], key: &CipherKey) -> Result<Vec<u8>, StoreError> {
    let mut envelope = vec![0u8; NONCE_LEN + plaintext.len()];
    let (nonce, body) = envelope.split_at_mut(NONCE_LEN);
    OsRng.fill_bytes(nonce);
    body.copy_from_slice(plaintext);

    let mut cipher = XChaCha20::new(key.as_key(), XNonce::from_slice(nonce));
    cipher
        .try_apply_keystream(body)
        .map_err(|e| StoreError::Cipher(format!("Encryption failed: {e}")))?;

    Ok(envelope)
}

/// Decrypt an envelope produced by [`encrypt`].
pub fn decrypt(envelope: &[u8], key: &CipherKey) -> Result<Vec<u8>, StoreError> {
    if envelope.len() < NONCE_LEN {
        return Err(StoreError::EnvelopeTooShort {
            len: envelope.len(),
            min: NONCE_LEN,
        });
    }

    let (nonce, body) = envelope.split_at(NONCE_LEN);
    let mut plaintext = body.to_vec();

    let mut cipher = XChaCha20::new(key.as_key(), XNonce::from_slice(nonce));
    cipher
        .try_apply_keystream(&mut plaintext)
        .map_err(|e| StoreError::Cipher(format!("Decryption failed: {e}")))?;

    Ok(plaintext)
}
