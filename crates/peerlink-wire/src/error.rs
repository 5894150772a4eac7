//! Error types for the wire session.
//!
//! Construction-time problems are [`ConfigError`]s and abort construction.
//! Everything else is a per-call runtime error reported to the caller.

use peerlink_types::{AuthenticatorError, TransformError};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Invalid session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a configuration address value was not provided")]
    MissingAddress,
    #[error("invalid TCP address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("a nil agent id was provided")]
    NilAgentId,
    #[error("a nil listener id was provided")]
    NilListenerId,
    #[error("unknown authenticator {0:?} (expected 'opaque' or 'none')")]
    UnknownAuthenticator(String),
    #[error("unhandled transform type: {0:?}")]
    UnknownTransform(String),
    #[error("padding {value:?} is not a non-negative integer: {source}")]
    InvalidPadding {
        value: String,
        source: std::num::ParseIntError,
    },
}

/// Failure to establish the transport.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("there was an error listening on {address}: {source}")]
    Listen { address: String, source: io::Error },
    #[error("there was an error accepting a connection on {address}: {source}")]
    Accept { address: String, source: io::Error },
    #[error("there was an error connecting to {address}: {source}")]
    Dial { address: String, source: io::Error },
    #[error("cannot listen on {address}: the session dials out in tcp-reverse mode")]
    NotBindMode { address: String },
}

/// Failure inside the transform pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("the transform pipeline has no stages")]
    Empty,
    #[error("unable to transform data into a message: no stage produced one")]
    NoMessageProduced,
    #[error("transform stage {index} ({stage}) failed: {source}")]
    Stage {
        index: usize,
        stage: &'static str,
        source: TransformError,
    },
}

/// Failure of one request/response round trip.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("there was an error constructing the data: {0}")]
    Construct(#[source] PipelineError),
    #[error("there was an error encoding the envelope: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("there was an error writing the message to {peer}: {source}")]
    Write { peer: SocketAddr, source: io::Error },
    #[error("received EOF from {peer}, the connection has been reset")]
    PeerReset { peer: SocketAddr },
    #[error("there was an error reading the message from {peer}: {source}")]
    Read { peer: SocketAddr, source: io::Error },
    #[error("there was an error deconstructing the data: {0}")]
    Deconstruct(#[source] PipelineError),
}

/// Failure of the authentication loop.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication protocol error: {0}")]
    Protocol(#[from] AuthenticatorError),
    #[error("authentication transport error: {0}")]
    Transport(#[from] SendError),
}

/// Failure of a runtime setting change.
#[derive(Debug, Error)]
pub enum SettingError {
    #[error("unknown tcp client setting: {0}")]
    UnknownSetting(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Any error surfaced by the wire session.
#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Setting(#[from] SettingError),
}

/// Alias for wire session results.
pub type WireResult<T> = Result<T, WireError>;
