//! The `opaque` authenticator: keyed challenge-response over the pre-shared key.
//!
//! Two rounds, each carried as an [`AuthFrame`] in the payload of an
//! [`MessageType::Opaque`] message:
//!
//! ```text
//! agent                                   peer
//!   | Init { client_nonce }                 |
//!   |-------------------------------------->|
//!   |   Challenge { server_nonce, proof_s } |
//!   |<--------------------------------------|
//!   | Complete { proof_c }                  |  (sent under the session key)
//!   |-------------------------------------->|
//! ```
//!
//! Proofs and the session key are HMAC-SHA256 values keyed with the
//! pre-shared key over domain-separated nonce transcripts. Both sides learn
//! the session key once the challenge is exchanged; the agent only adopts it
//! after verifying the peer's proof.

use hmac::{Hmac, Mac};
use peerlink_types::{Authenticator, AuthenticatorError, Message, MessageType};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Length of each side's random nonce.
pub const NONCE_LEN: usize = 32;

/// Handshake frames exchanged inside `Opaque` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthFrame {
    /// Agent opens an exchange.
    Init { client_nonce: Vec<u8> },
    /// Peer proves knowledge of the key and contributes its nonce.
    Challenge {
        server_nonce: Vec<u8>,
        server_proof: Vec<u8>,
    },
    /// Agent proves knowledge of the key.
    Complete { client_proof: Vec<u8> },
    /// Peer refused the exchange.
    Rejected { reason: String },
    /// Peer asks the agent to start over.
    ReAuthenticate,
}

impl AuthFrame {
    /// Wrap the frame in an `Opaque` message from `id`.
    pub fn into_message(self, id: Uuid) -> Result<Message, AuthenticatorError> {
        let payload = rmp_serde::to_vec_named(&self)
            .map_err(|e| AuthenticatorError::Internal(format!("frame encode: {e}")))?;
        Ok(Message::with_payload(id, MessageType::Opaque, payload))
    }

    /// Extract a frame from an `Opaque` message.
    pub fn from_message(msg: &Message) -> Result<Self, AuthenticatorError> {
        if msg.kind != MessageType::Opaque {
            return Err(AuthenticatorError::Malformed(format!(
                "expected an opaque message, got {}",
                msg.kind
            )));
        }
        rmp_serde::from_slice(&msg.payload)
            .map_err(|e| AuthenticatorError::Malformed(format!("frame decode: {e}")))
    }
}

fn mac(
    psk: &[u8],
    label: &[u8],
    first: &[u8],
    second: &[u8],
) -> Result<Vec<u8>, AuthenticatorError> {
    let mut mac = HmacSha256::new_from_slice(psk)
        .map_err(|e| AuthenticatorError::Internal(format!("HMAC key: {e}")))?;
    mac.update(label);
    mac.update(first);
    mac.update(second);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Proof the peer sends with its challenge.
pub fn server_proof(
    psk: &[u8],
    client_nonce: &[u8],
    server_nonce: &[u8],
) -> Result<Vec<u8>, AuthenticatorError> {
    mac(psk, b"server", client_nonce, server_nonce)
}

/// Proof the agent sends to complete the exchange.
pub fn client_proof(
    psk: &[u8],
    client_nonce: &[u8],
    server_nonce: &[u8],
) -> Result<Vec<u8>, AuthenticatorError> {
    mac(psk, b"client", server_nonce, client_nonce)
}

/// Session key both sides adopt after the exchange.
pub fn session_key(
    psk: &[u8],
    client_nonce: &[u8],
    server_nonce: &[u8],
) -> Result<Vec<u8>, AuthenticatorError> {
    mac(psk, b"session", client_nonce, server_nonce)
}

fn verify(expected: &[u8], presented: &[u8]) -> bool {
    expected.ct_eq(presented).into()
}

fn random_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[derive(Debug)]
enum State {
    Idle,
    AwaitingChallenge { client_nonce: Vec<u8> },
    Authenticated { key: Zeroizing<Vec<u8>> },
}

/// Agent side of the challenge-response exchange.
pub struct ChallengeAuthenticator {
    agent_id: Uuid,
    psk: Zeroizing<Vec<u8>>,
    state: State,
}

impl ChallengeAuthenticator {
    pub fn new(agent_id: Uuid, psk: &str) -> Self {
        Self {
            agent_id,
            psk: Zeroizing::new(psk.as_bytes().to_vec()),
            state: State::Idle,
        }
    }

    fn start(&mut self) -> Result<(Message, bool), AuthenticatorError> {
        let client_nonce = random_nonce();
        let msg = AuthFrame::Init {
            client_nonce: client_nonce.clone(),
        }
        .into_message(self.agent_id)?;
        self.state = State::AwaitingChallenge { client_nonce };
        debug!(agent = %self.agent_id, "Starting challenge-response exchange");
        Ok((msg, false))
    }
}

impl Authenticator for ChallengeAuthenticator {
    fn name(&self) -> &'static str {
        "opaque"
    }

    fn authenticate(&mut self, msg: Message) -> Result<(Message, bool), AuthenticatorError> {
        if msg.kind != MessageType::Opaque || msg.payload.is_empty() {
            return self.start();
        }

        match AuthFrame::from_message(&msg)? {
            AuthFrame::ReAuthenticate => self.start(),
            AuthFrame::Challenge {
                server_nonce,
                server_proof: presented,
            } => {
                let client_nonce = match &self.state {
                    State::AwaitingChallenge { client_nonce } => client_nonce.clone(),
                    _ => {
                        return Err(AuthenticatorError::UnexpectedState(
                            "challenge received without a pending exchange".to_string(),
                        ))
                    }
                };
                let expected = server_proof(&self.psk, &client_nonce, &server_nonce)?;
                if !verify(&expected, &presented) {
                    warn!(agent = %self.agent_id, "Peer proof did not verify");
                    self.state = State::Idle;
                    return Err(AuthenticatorError::Verification(
                        "server proof mismatch".to_string(),
                    ));
                }

                let proof = client_proof(&self.psk, &client_nonce, &server_nonce)?;
                let key = session_key(&self.psk, &client_nonce, &server_nonce)?;
                self.state = State::Authenticated {
                    key: Zeroizing::new(key),
                };
                let reply = AuthFrame::Complete {
                    client_proof: proof,
                }
                .into_message(self.agent_id)?;
                debug!(agent = %self.agent_id, "Peer verified, session key derived");
                Ok((reply, true))
            }
            AuthFrame::Rejected { reason } => {
                self.state = State::Idle;
                Err(AuthenticatorError::Rejected(reason))
            }
            other => Err(AuthenticatorError::UnexpectedState(format!(
                "agent cannot handle {other:?}"
            ))),
        }
    }

    fn secret(&self) -> Result<Vec<u8>, AuthenticatorError> {
        match &self.state {
            State::Authenticated { key } => Ok(key.to_vec()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Peer side of the exchange, for servers and test harnesses.
pub struct ChallengeResponder {
    server_id: Uuid,
    psk: Zeroizing<Vec<u8>>,
    pending: Option<(Vec<u8>, Vec<u8>)>,
    key: Option<Zeroizing<Vec<u8>>>,
    verified: bool,
}

impl ChallengeResponder {
    pub fn new(server_id: Uuid, psk: &str) -> Self {
        Self {
            server_id,
            psk: Zeroizing::new(psk.as_bytes().to_vec()),
            pending: None,
            key: None,
            verified: false,
        }
    }

    /// Key the agent will encrypt with after it accepts the challenge.
    pub fn session_key(&self) -> Option<&[u8]> {
        self.key.as_ref().map(|k| k.as_slice())
    }

    /// Whether the agent's completion proof has been verified.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Process one agent frame and produce the reply.
    pub fn respond(&mut self, msg: &Message) -> Result<Message, AuthenticatorError> {
        match AuthFrame::from_message(msg)? {
            AuthFrame::Init { client_nonce } => {
                let server_nonce = random_nonce();
                let proof = server_proof(&self.psk, &client_nonce, &server_nonce)?;
                self.key = Some(Zeroizing::new(session_key(
                    &self.psk,
                    &client_nonce,
                    &server_nonce,
                )?));
                self.pending = Some((client_nonce, server_nonce.clone()));
                self.verified = false;
                AuthFrame::Challenge {
                    server_nonce,
                    server_proof: proof,
                }
                .into_message(self.server_id)
            }
            AuthFrame::Complete {
                client_proof: presented,
            } => {
                let (client_nonce, server_nonce) = self.pending.take().ok_or_else(|| {
                    AuthenticatorError::UnexpectedState("completion without challenge".to_string())
                })?;
                let expected = client_proof(&self.psk, &client_nonce, &server_nonce)?;
                if !verify(&expected, &presented) {
                    return Err(AuthenticatorError::Verification(
                        "client proof mismatch".to_string(),
                    ));
                }
                self.verified = true;
                Ok(Message::new(self.server_id, MessageType::Idle))
            }
            other => Err(AuthenticatorError::UnexpectedState(format!(
                "peer cannot handle {other:?}"
            ))),
        }
    }
}
