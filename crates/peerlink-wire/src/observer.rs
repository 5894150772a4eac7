//! Diagnostic event sink.
//!
//! The session reports what it is doing through a [`SessionObserver`] passed
//! in at construction rather than logging directly. [`TracingObserver`] is
//! the default and forwards every event to `tracing`.

use crate::config::Mode;
use peerlink_types::MessageType;
use std::net::SocketAddr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Something noteworthy happened inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was constructed.
    Configured {
        mode: Mode,
        address: String,
        listener_id: Uuid,
        authenticator: &'static str,
        transforms: Vec<&'static str>,
        padding_max: usize,
    },
    /// The configured mode was not recognised and bind mode was used.
    ModeDefaulted { given: String },
    /// The bind-mode listener is up.
    Listening { local: SocketAddr },
    /// Blocked in accept.
    AwaitingPeer,
    /// A connection was established (accepted or dialed).
    Connected { peer: SocketAddr },
    /// A send found no connection and is re-establishing one.
    Reconnecting,
    /// An envelope is about to be written.
    Sending {
        kind: MessageType,
        peer: SocketAddr,
        bytes: usize,
    },
    /// A response was read.
    Received { peer: SocketAddr, bytes: usize },
    /// The peer closed or reset the connection; it has been cleared.
    PeerReset { peer: SocketAddr },
    /// The authenticator supplied a new session secret.
    SecretRotated,
    /// The handshake finished.
    Authenticated { authenticator: &'static str },
}

/// Receives session events.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Forwards session events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Configured {
                mode,
                address,
                listener_id,
                authenticator,
                transforms,
                padding_max,
            } => info!(
                protocol = %mode,
                %address,
                listener = %listener_id,
                authenticator,
                ?transforms,
                padding = padding_max,
                "Client configured"
            ),
            SessionEvent::ModeDefaulted { given } => warn!(
                mode = %given,
                "Unrecognised client mode, defaulting to tcp-bind"
            ),
            SessionEvent::Listening { local } => info!(%local, "Started tcp-bind listener"),
            SessionEvent::AwaitingPeer => info!("Listening for incoming connection..."),
            SessionEvent::Connected { peer } => info!(%peer, "Connection established"),
            SessionEvent::Reconnecting => {
                info!("Client connection was empty, re-establishing it")
            }
            SessionEvent::Sending { kind, peer, bytes } => {
                debug!(%kind, %peer, bytes, "Sending message")
            }
            SessionEvent::Received { peer, bytes } => debug!(%peer, bytes, "Read response"),
            SessionEvent::PeerReset { peer } => {
                warn!(%peer, "Peer reset the connection; next send will reconnect")
            }
            SessionEvent::SecretRotated => debug!("Adopted negotiated session secret"),
            SessionEvent::Authenticated { authenticator } => {
                info!(authenticator, "Agent authenticated")
            }
        }
    }
}
