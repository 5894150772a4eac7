//! Plaintext framing shared by the encryption stages.
//!
//! Encryption stages accept either a message or raw bytes, and must hand back
//! the same kind on the way in. The plaintext therefore starts with a one-byte
//! tag: a message is stored as named MessagePack, bytes are stored verbatim.

use peerlink_types::{Message, Payload, TransformError, Variant};
use sha2::{Digest, Sha256};

const TAG_MESSAGE: u8 = 0x01;
const TAG_BYTES: u8 = 0x02;

/// Frame an outbound payload as tagged plaintext.
pub(crate) fn seal(input: Payload) -> Result<Vec<u8>, TransformError> {
    match input {
        Payload::Message(msg) => {
            let body =
                rmp_serde::to_vec_named(&msg).map_err(|e| TransformError::Encode(e.to_string()))?;
            let mut out = Vec::with_capacity(1 + body.len());
            out.push(TAG_MESSAGE);
            out.extend_from_slice(&body);
            Ok(out)
        }
        Payload::Bytes(bytes) => {
            let mut out = Vec::with_capacity(1 + bytes.len());
            out.push(TAG_BYTES);
            out.extend_from_slice(&bytes);
            Ok(out)
        }
    }
}

/// Recover the payload kind from tagged plaintext.
pub(crate) fn unseal(plaintext: &[u8]) -> Result<Variant, TransformError> {
    match plaintext.split_first() {
        Some((&TAG_MESSAGE, body)) => {
            let msg: Message =
                rmp_serde::from_slice(body).map_err(|e| TransformError::Decode(e.to_string()))?;
            Ok(Variant::Message(msg))
        }
        Some((&TAG_BYTES, body)) => Ok(Variant::Bytes(body.to_vec())),
        Some((tag, _)) => Err(TransformError::Malformed(format!(
            "unknown plaintext tag 0x{tag:02x}"
        ))),
        None => Err(TransformError::Malformed("empty plaintext".to_string())),
    }
}

/// Derive a 256-bit content key from a secret of any length.
pub(crate) fn content_key(secret: &[u8]) -> [u8; 32] {
    Sha256::digest(secret).into()
}
