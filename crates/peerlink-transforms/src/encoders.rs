//! MessagePack structural encoders (`gob-base`, `gob-string`).

use peerlink_types::{Message, Payload, Transform, TransformError, Variant};

/// What a [`MessagePackEncoder`] encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// A whole [`Message`].
    Base,
    /// A UTF-8 string, typically the output of a textual encryption stage.
    String,
}

/// Encodes messages or strings as self-describing MessagePack.
#[derive(Debug, Clone, Copy)]
pub struct MessagePackEncoder {
    encoding: Encoding,
}

impl MessagePackEncoder {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }
}

impl Transform for MessagePackEncoder {
    fn name(&self) -> &'static str {
        match self.encoding {
            Encoding::Base => "gob-base",
            Encoding::String => "gob-string",
        }
    }

    fn construct(&self, input: Payload, _secret: &[u8]) -> Result<Vec<u8>, TransformError> {
        match (self.encoding, input) {
            (Encoding::Base, Payload::Message(msg)) => {
                rmp_serde::to_vec_named(&msg).map_err(|e| TransformError::Encode(e.to_string()))
            }
            (Encoding::String, Payload::Bytes(bytes)) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    TransformError::Encode(format!("input is not valid UTF-8: {e}"))
                })?;
                rmp_serde::to_vec(&text).map_err(|e| TransformError::Encode(e.to_string()))
            }
            (_, other) => Err(TransformError::UnsupportedInput {
                stage: self.name(),
                input: other.label(),
            }),
        }
    }

    fn deconstruct(&self, data: &[u8], _secret: &[u8]) -> Result<Variant, TransformError> {
        match self.encoding {
            Encoding::Base => {
                let msg: Message = rmp_serde::from_slice(data)
                    .map_err(|e| TransformError::Decode(e.to_string()))?;
                Ok(Variant::Message(msg))
            }
            Encoding::String => {
                let text: String = rmp_serde::from_slice(data)
                    .map_err(|e| TransformError::Decode(e.to_string()))?;
                Ok(Variant::Text(text))
            }
        }
    }
}
