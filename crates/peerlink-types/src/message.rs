//! Application messages and the wire envelope that carries them.
//!
//! A [`Message`] is what callers and authenticators exchange. It is never
//! written to the socket directly: the transform pipeline turns it into
//! opaque bytes, which travel inside a [`Delegate`] envelope tagged with the
//! routing identifiers of the agent and the listener it belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current message format version.
pub const MESSAGE_VERSION: u32 = 1;

/// The kind of an application message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Periodic agent check-in.
    Checkin,
    /// Authentication handshake traffic.
    Opaque,
    /// Work items for the agent.
    Jobs,
    /// Nothing to do.
    Idle,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Checkin => write!(f, "checkin"),
            MessageType::Opaque => write!(f, "opaque"),
            MessageType::Jobs => write!(f, "jobs"),
            MessageType::Idle => write!(f, "idle"),
        }
    }
}

/// An application-level message (the "base" message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message format version.
    pub version: u32,
    /// Identifier of the sender (the agent id for outbound traffic).
    pub id: Uuid,
    /// What the payload contains.
    pub kind: MessageType,
    /// Optional bearer token, empty when unused.
    #[serde(default)]
    pub token: String,
    /// Opaque body.
    #[serde(default, with = "serde_bytes_compat")]
    pub payload: Vec<u8>,
    /// Random filler used to vary message sizes on the wire.
    #[serde(default)]
    pub padding: String,
}

impl Message {
    /// Create a message with an empty body.
    pub fn new(id: Uuid, kind: MessageType) -> Self {
        Self {
            version: MESSAGE_VERSION,
            id,
            kind,
            token: String::new(),
            payload: Vec::new(),
            padding: String::new(),
        }
    }

    /// Create a message carrying `payload`.
    pub fn with_payload(id: Uuid, kind: MessageType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::new(id, kind)
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Uuid::nil(), MessageType::Checkin)
    }
}

/// The wire envelope: routing identifiers plus the transformed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    /// The listener this agent is associated with.
    pub listener: Uuid,
    /// The sending agent.
    pub agent: Uuid,
    /// Output of the transform pipeline.
    #[serde(with = "serde_bytes_compat")]
    pub payload: Vec<u8>,
}

/// Encode an envelope as self-describing MessagePack (field names included).
pub fn encode_delegate(delegate: &Delegate) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(delegate)
}

/// Decode an envelope produced by [`encode_delegate`].
pub fn decode_delegate(bytes: &[u8]) -> Result<Delegate, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// Serialize `Vec<u8>` as a MessagePack bin instead of an array of integers.
mod serde_bytes_compat {
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte buffer")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(v)
            }

            // Peers that encode payloads as integer arrays are accepted too.
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}
