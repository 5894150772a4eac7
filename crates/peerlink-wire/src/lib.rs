//! Agent-side peer-to-peer TCP transport.
//!
//! A [`Session`] carries [`Message`](peerlink_types::Message)s between an
//! agent and one peer over a single TCP connection, either accepted
//! (`tcp-bind`) or dialed (`tcp-reverse`).
//!
//! Each outbound message is optionally padded, run through the configured
//! [`Pipeline`] of encoding and encryption stages, wrapped in a
//! [`Delegate`](peerlink_types::Delegate) envelope and written in one piece.
//! The reply is read in one piece and run back through the pipeline.
//!
//! Before application traffic the session runs a pluggable handshake
//! ([`Session::authenticate`]) that may replace the pre-shared secret with a
//! negotiated key. If the peer drops the connection, the next
//! [`Session::send`] establishes a new one.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod observer;
pub mod pipeline;
pub mod session;

pub use config::{Mode, TransportConfig};
pub use connection::ConnectionManager;
pub use error::{
    AuthError, ConfigError, ConnectError, PipelineError, SendError, SettingError, WireError,
    WireResult,
};
pub use exchange::READ_CEILING;
pub use observer::{SessionEvent, SessionObserver, TracingObserver};
pub use pipeline::{Direction, Pipeline};
pub use session::Session;
