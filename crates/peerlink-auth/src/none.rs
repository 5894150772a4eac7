//! The `none` authenticator: no handshake, no negotiated key.

use peerlink_types::{Authenticator, AuthenticatorError, Message, MessageType};
use uuid::Uuid;

/// Reports the agent as authenticated on the first round.
///
/// Traffic keeps using the secret derived from the pre-shared key.
#[derive(Debug, Clone)]
pub struct NoneAuthenticator {
    agent_id: Uuid,
}

impl NoneAuthenticator {
    pub fn new(agent_id: Uuid) -> Self {
        Self { agent_id }
    }
}

impl Authenticator for NoneAuthenticator {
    fn name(&self) -> &'static str {
        "none"
    }

    fn authenticate(&mut self, _msg: Message) -> Result<(Message, bool), AuthenticatorError> {
        Ok((Message::new(self.agent_id, MessageType::Checkin), true))
    }

    fn secret(&self) -> Result<Vec<u8>, AuthenticatorError> {
        Ok(Vec::new())
    }
}
