//! JWE compact serialization stage (`jwe`).
//!
//! Produces RFC 7516 compact tokens using direct key agreement (`alg: dir`)
//! and AES-256-GCM content encryption (`enc: A256GCM`). The content key is
//! SHA-256 of the session secret. The encoded protected header is the
//! additional authenticated data, and the encrypted-key segment is empty.

use crate::sealed::{content_key, seal, unseal};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload as AeadPayload};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use peerlink_types::{Payload, Transform, TransformError, Variant};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const ALG: &str = "dir";
const ENC: &str = "A256GCM";
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// JOSE protected header.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    enc: String,
}

/// JWE encryption with a direct symmetric key.
#[derive(Debug, Clone, Copy, Default)]
pub struct JweEncrypter;

impl JweEncrypter {
    pub fn new() -> Self {
        Self
    }
}

fn b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

fn unb64(part: &str, what: &str) -> Result<Vec<u8>, TransformError> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| TransformError::Malformed(format!("invalid base64 in {what}: {e}")))
}

impl Transform for JweEncrypter {
    fn name(&self) -> &'static str {
        "jwe"
    }

    fn construct(&self, input: Payload, secret: &[u8]) -> Result<Vec<u8>, TransformError> {
        let plaintext = seal(input)?;
        let header = Header {
            alg: ALG.to_string(),
            enc: ENC.to_string(),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| TransformError::Encode(e.to_string()))?;
        let protected = b64(&header_json);

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let key = content_key(secret);
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));
        let sealed = cipher
            .encrypt(
                GenericArray::from_slice(&iv),
                AeadPayload {
                    msg: &plaintext,
                    aad: protected.as_bytes(),
                },
            )
            .map_err(|e| TransformError::Encrypt(e.to_string()))?;

        // aes-gcm appends the tag to the ciphertext; JWE carries it separately.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        let token = format!("{}..{}.{}.{}", protected, b64(&iv), b64(ciphertext), b64(tag));
        Ok(token.into_bytes())
    }

    fn deconstruct(&self, data: &[u8], secret: &[u8]) -> Result<Variant, TransformError> {
        let token = std::str::from_utf8(data)
            .map_err(|e| TransformError::Malformed(format!("token is not UTF-8: {e}")))?;
        let parts: Vec<&str> = token.trim().split('.').collect();
        let [protected, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
            return Err(TransformError::Malformed(format!(
                "expected 5 compact segments, found {}",
                parts.len()
            )));
        };

        let header: Header = serde_json::from_slice(&unb64(protected, "header")?)
            .map_err(|e| TransformError::Malformed(format!("invalid header: {e}")))?;
        if header.alg != ALG || header.enc != ENC {
            return Err(TransformError::Malformed(format!(
                "unsupported algorithms alg={} enc={}",
                header.alg, header.enc
            )));
        }
        if !encrypted_key.is_empty() {
            return Err(TransformError::Malformed(
                "direct encryption must not carry an encrypted key".to_string(),
            ));
        }

        let iv = unb64(iv, "iv")?;
        if iv.len() != IV_LEN {
            return Err(TransformError::Malformed(format!(
                "iv must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let tag = unb64(tag, "tag")?;
        if tag.len() != TAG_LEN {
            return Err(TransformError::Malformed(format!(
                "tag must be {TAG_LEN} bytes, got {}",
                tag.len()
            )));
        }
        let mut sealed = unb64(ciphertext, "ciphertext")?;
        sealed.extend_from_slice(&tag);

        let key = content_key(secret);
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));
        let plaintext = cipher
            .decrypt(
                GenericArray::from_slice(&iv),
                AeadPayload {
                    msg: &sealed,
                    aad: protected.as_bytes(),
                },
            )
            .map_err(|_| TransformError::Decrypt("authentication tag mismatch".to_string()))?;
        unseal(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_types::{Message, MessageType};
    use uuid::Uuid;

    const SECRET: &[u8] = b"jwe-test-secret";

    #[test]
    fn test_compact_structure() {
        let jwe = JweEncrypter::new();
        let token = jwe.construct(Payload::Bytes(b"hi".to_vec()), SECRET).unwrap();
        let token = String::from_utf8(token).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 5);
        assert!(parts[1].is_empty());

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "dir");
        assert_eq!(header["enc"], "A256GCM");
    }

    #[test]
    fn test_message_roundtrip() {
        let jwe = JweEncrypter::new();
        let msg = Message::with_payload(Uuid::new_v4(), MessageType::Checkin, b"body".to_vec());
        let token = jwe.construct(Payload::Message(msg.clone()), SECRET).unwrap();
        assert_eq!(jwe.deconstruct(&token, SECRET).unwrap(), Variant::Message(msg));
    }

    #[test]
    fn test_wrong_key_fails() {
        let jwe = JweEncrypter::new();
        let token = jwe.construct(Payload::Bytes(b"hi".to_vec()), SECRET).unwrap();
        assert!(matches!(
            jwe.deconstruct(&token, b"not the key"),
            Err(TransformError::Decrypt(_))
        ));
    }

    #[test]
    fn test_modified_header_fails() {
        let jwe = JweEncrypter::new();
        let token = jwe.construct(Payload::Bytes(b"hi".to_vec()), SECRET).unwrap();
        let token = String::from_utf8(token).unwrap();
        let (_, rest) = token.split_once('.').unwrap();
        // Same algorithms, different header bytes: the AAD no longer matches.
        let forged_header = b64(br#"{"enc":"A256GCM","alg":"dir"}"#);
        let forged = format!("{forged_header}.{rest}");
        assert!(matches!(
            jwe.deconstruct(forged.as_bytes(), SECRET),
            Err(TransformError::Decrypt(_))
        ));
    }

    #[test]
    fn test_malformed_token() {
        let jwe = JweEncrypter::new();
        assert!(matches!(
            jwe.deconstruct(b"a.b.c", SECRET),
            Err(TransformError::Malformed(_))
        ));
    }
}
