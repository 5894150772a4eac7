//! Encoding and encryption stages for the peerlink transform pipeline.
//!
//! Stages are selected by name from configuration:
//!
//! | Name | Stage |
//! |---|---|
//! | `gob-base` | MessagePack encoding of a whole message |
//! | `gob-string` | MessagePack encoding of a UTF-8 string |
//! | `aes` | AES-256-GCM |
//! | `jwe` | JWE compact serialization (`dir` + `A256GCM`) |

pub mod aes;
pub mod encoders;
pub mod jwe;
mod sealed;

pub use aes::AesEncrypter;
pub use encoders::{Encoding, MessagePackEncoder};
pub use jwe::JweEncrypter;

use peerlink_types::Transform;
use thiserror::Error;
use tracing::debug;

/// Every stage name understood by [`transform_by_name`].
pub const TRANSFORM_NAMES: [&str; 4] = ["gob-base", "gob-string", "aes", "jwe"];

/// A configured stage name that does not match any known stage.
#[derive(Debug, Error)]
#[error("unhandled transform type: {0:?}")]
pub struct UnknownTransform(pub String);

/// Look up a stage by its configuration name (case-insensitive).
pub fn transform_by_name(name: &str) -> Option<Box<dyn Transform>> {
    let stage: Box<dyn Transform> = match name.trim().to_lowercase().as_str() {
        "gob-base" => Box::new(MessagePackEncoder::new(Encoding::Base)),
        "gob-string" => Box::new(MessagePackEncoder::new(Encoding::String)),
        "aes" => Box::new(AesEncrypter::new()),
        "jwe" => Box::new(JweEncrypter::new()),
        _ => return None,
    };
    Some(stage)
}

/// Build an ordered stage list from a comma-separated configuration value.
pub fn parse_transform_list(list: &str) -> Result<Vec<Box<dyn Transform>>, UnknownTransform> {
    let stages = list
        .split(',')
        .map(|name| transform_by_name(name).ok_or_else(|| UnknownTransform(name.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Assembled transform stages"
    );
    Ok(stages)
}
