//! Core types and traits for the peerlink agent transport.
//!
//! This crate defines the data structures and capability seams shared by the
//! transform stages, the authenticators and the wire session. It contains no
//! business logic.

pub mod auth;
pub mod message;
pub mod transform;

pub use auth::{Authenticator, AuthenticatorError};
pub use message::{Delegate, Message, MessageType, MESSAGE_VERSION};
pub use transform::{Payload, Transform, TransformError, Variant};
