//! The authenticator capability.
//!
//! An authenticator implements one challenge-response protocol. The session
//! feeds it the last message received from the peer and sends whatever it
//! returns, until the authenticator reports that the agent is authenticated.

use crate::message::Message;
use thiserror::Error;

/// Errors raised by an authenticator.
#[derive(Debug, Error)]
pub enum AuthenticatorError {
    /// The peer's message could not be parsed.
    #[error("malformed handshake message: {0}")]
    Malformed(String),
    /// The peer failed to prove knowledge of the shared secret.
    #[error("peer verification failed: {0}")]
    Verification(String),
    /// The peer refused the handshake.
    #[error("peer rejected authentication: {0}")]
    Rejected(String),
    /// A message arrived that does not fit the current protocol state.
    #[error("unexpected handshake state: {0}")]
    UnexpectedState(String),
    /// Any other internal failure.
    #[error("authenticator error: {0}")]
    Internal(String),
}

/// A pluggable handshake protocol.
pub trait Authenticator: Send + Sync {
    /// Configuration name of the authenticator (e.g. `none`).
    fn name(&self) -> &'static str;

    /// Advance the protocol with the peer's last message.
    ///
    /// Returns the message to send next and whether the agent is now
    /// authenticated.
    fn authenticate(&mut self, msg: Message) -> Result<(Message, bool), AuthenticatorError>;

    /// The negotiated key, or an empty vector when the protocol negotiates
    /// none and the pre-shared secret stays in use.
    fn secret(&self) -> Result<Vec<u8>, AuthenticatorError>;
}
