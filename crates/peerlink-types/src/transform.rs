//! The transform stage capability.
//!
//! A transform is one reversible step (encoding or encryption) in the chain
//! that turns a [`Message`] into wire bytes and back. Stages are composed by
//! the pipeline in `peerlink-wire`; this module only defines the seam.

use crate::message::Message;
use thiserror::Error;

/// Input handed to [`Transform::construct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The application message (first stage applied outbound).
    Message(Message),
    /// Output of the previously applied stage.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Short label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Payload::Message(_) => "message",
            Payload::Bytes(_) => "bytes",
        }
    }
}

/// Output of [`Transform::deconstruct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    /// Raw bytes for the next stage.
    Bytes(Vec<u8>),
    /// Textual output for the next stage.
    Text(String),
    /// A fully decoded message; ends inbound processing.
    Message(Message),
}

/// Errors raised by a single transform stage.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The stage cannot consume this kind of input.
    #[error("unsupported input for {stage}: {input}")]
    UnsupportedInput {
        stage: &'static str,
        input: &'static str,
    },
    /// Structural encoding failed.
    #[error("encode failed: {0}")]
    Encode(String),
    /// Structural decoding failed.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),
    /// Decryption or authentication of ciphertext failed.
    #[error("decryption failed: {0}")]
    Decrypt(String),
    /// Input was not in the format the stage produces.
    #[error("malformed input: {0}")]
    Malformed(String),
}

/// A reversible encoding or encryption step.
pub trait Transform: Send + Sync {
    /// Configuration name of the stage (e.g. `aes`).
    fn name(&self) -> &'static str;

    /// Apply the stage outbound, producing bytes.
    fn construct(&self, input: Payload, secret: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Reverse the stage inbound.
    fn deconstruct(&self, data: &[u8], secret: &[u8]) -> Result<Variant, TransformError>;
}
