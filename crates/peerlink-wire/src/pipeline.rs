//! The transform pipeline.
//!
//! Stages are configured outermost first, the way a receiver peels them off.
//! Outbound traffic therefore walks the list back to front: the last stage
//! sees the message itself and every earlier stage wraps the bytes produced
//! after it. Inbound traffic walks front to back until a stage yields a
//! message.

use crate::error::PipelineError;
use peerlink_types::{Message, Payload, Transform, Variant};
use peerlink_transforms::{parse_transform_list, UnknownTransform};

/// Which way data flows through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Message to wire bytes: stages applied last to first.
    Outbound,
    /// Wire bytes to message: stages applied first to last.
    Inbound,
}

/// An immutable, ordered list of transform stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Transform>>) -> Self {
        Self { stages }
    }

    /// Build a pipeline from a comma-separated list of stage names.
    pub fn from_names(list: &str) -> Result<Self, UnknownTransform> {
        Ok(Self::new(parse_transform_list(list)?))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in configuration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Stage indices in the order `direction` visits them.
    fn order(&self, direction: Direction) -> Vec<usize> {
        let indices = 0..self.stages.len();
        match direction {
            Direction::Outbound => indices.rev().collect(),
            Direction::Inbound => indices.collect(),
        }
    }

    /// Run every stage in `direction` order.
    ///
    /// Outbound, each stage turns the payload into bytes. Inbound, stages
    /// run until one yields a message, which is returned immediately; if
    /// none does, the remaining bytes are returned.
    pub fn apply(
        &self,
        direction: Direction,
        payload: Payload,
        secret: &[u8],
    ) -> Result<Payload, PipelineError> {
        let mut payload = payload;
        for index in self.order(direction) {
            let stage = &self.stages[index];
            let wrap = |source| PipelineError::Stage {
                index,
                stage: stage.name(),
                source,
            };
            payload = match direction {
                Direction::Outbound => {
                    Payload::Bytes(stage.construct(payload, secret).map_err(wrap)?)
                }
                Direction::Inbound => {
                    let data = match payload {
                        Payload::Bytes(data) => data,
                        done @ Payload::Message(_) => return Ok(done),
                    };
                    match stage.deconstruct(&data, secret).map_err(wrap)? {
                        Variant::Bytes(bytes) => Payload::Bytes(bytes),
                        Variant::Text(text) => Payload::Bytes(text.into_bytes()),
                        Variant::Message(msg) => return Ok(Payload::Message(msg)),
                    }
                }
            };
        }
        Ok(payload)
    }

    /// Encode and encrypt a message for the wire.
    pub fn construct(&self, msg: Message, secret: &[u8]) -> Result<Vec<u8>, PipelineError> {
        match self.apply(Direction::Outbound, Payload::Message(msg), secret)? {
            Payload::Bytes(bytes) => Ok(bytes),
            // Only possible when no stage ran.
            Payload::Message(_) => Err(PipelineError::Empty),
        }
    }

    /// Decrypt and decode wire bytes back into a message.
    pub fn deconstruct(&self, data: &[u8], secret: &[u8]) -> Result<Message, PipelineError> {
        match self.apply(Direction::Inbound, Payload::Bytes(data.to_vec()), secret)? {
            Payload::Message(msg) => Ok(msg),
            Payload::Bytes(_) => Err(PipelineError::NoMessageProduced),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}
