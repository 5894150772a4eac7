//! AES-256-GCM encryption stage (`aes`).
//!
//! Wire format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`. The key is
//! SHA-256 of the session secret, so secrets of any length are usable.

use crate::sealed::{content_key, seal, unseal};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use peerlink_types::{Payload, Transform, TransformError, Variant};
use rand::RngCore;

/// Length of the random nonce prefix.
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Symmetric encryption with AES-256-GCM.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesEncrypter;

impl AesEncrypter {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for AesEncrypter {
    fn name(&self) -> &'static str {
        "aes"
    }

    fn construct(&self, input: Payload, secret: &[u8]) -> Result<Vec<u8>, TransformError> {
        let plaintext = seal(input)?;
        let key = content_key(secret);
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| TransformError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn deconstruct(&self, data: &[u8], secret: &[u8]) -> Result<Variant, TransformError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(TransformError::Malformed(format!(
                "ciphertext too short: {} bytes",
                data.len()
            )));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let key = content_key(secret);
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));

        let plaintext = cipher
            .decrypt(GenericArray::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| TransformError::Decrypt("authentication tag mismatch".to_string()))?;
        unseal(&plaintext)
    }
}
