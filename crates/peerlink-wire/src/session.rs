//! The session: one agent's relationship with one peer.
//!
//! A [`Session`] is built from a validated [`TransportConfig`], establishes
//! its transport with [`Session::initial`], and afterwards carries
//! application traffic with [`Session::send`]. The handshake loop lives in
//! `auth.rs` and the round trip in `exchange.rs`.

use crate::config::{parse_padding, validate_address, Mode, TransportConfig};
use crate::connection::ConnectionManager;
use crate::error::{ConfigError, ConnectError, SettingError, WireResult};
use crate::observer::{SessionEvent, SessionObserver, TracingObserver};
use crate::pipeline::Pipeline;
use peerlink_auth::authenticator_by_name;
use peerlink_types::{Authenticator, Message};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::sync::Arc;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Bootstrap secret used before (and, for some authenticators, after)
/// authentication: SHA-256 of the pre-shared key.
pub(crate) fn derive_secret(psk: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(Sha256::digest(psk.as_bytes()).to_vec())
}

/// An agent-side transport session.
pub struct Session {
    pub(crate) agent_id: Uuid,
    pub(crate) listener_id: Uuid,
    pub(crate) psk: Zeroizing<String>,
    pub(crate) secret: Zeroizing<Vec<u8>>,
    pub(crate) padding_max: usize,
    pub(crate) pipeline: Pipeline,
    pub(crate) authenticator: Box<dyn Authenticator>,
    pub(crate) connection: ConnectionManager,
    pub(crate) observer: Arc<dyn SessionObserver>,
    pub(crate) rng: SmallRng,
}

impl Session {
    /// Validate `config` and build a session that logs through `tracing`.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Validate `config` and build a session reporting to `observer`.
    pub fn with_observer(
        config: TransportConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ConfigError> {
        if config.agent_id.is_nil() {
            return Err(ConfigError::NilAgentId);
        }
        if config.listener_id.is_nil() {
            return Err(ConfigError::NilListenerId);
        }

        let mode = Mode::parse(&config.mode).unwrap_or_else(|| {
            observer.on_event(&SessionEvent::ModeDefaulted {
                given: config.mode.clone(),
            });
            Mode::Bind
        });

        let address = validate_address(&config.address)?;
        let padding_max = parse_padding(&config.padding)?;

        let authenticator = authenticator_by_name(&config.auth, config.agent_id, &config.psk)
            .ok_or_else(|| ConfigError::UnknownAuthenticator(config.auth.clone()))?;
        let pipeline = Pipeline::from_names(&config.transforms)
            .map_err(|e| ConfigError::UnknownTransform(e.0))?;

        observer.on_event(&SessionEvent::Configured {
            mode,
            address: address.clone(),
            listener_id: config.listener_id,
            authenticator: authenticator.name(),
            transforms: pipeline.names(),
            padding_max,
        });

        Ok(Self {
            agent_id: config.agent_id,
            listener_id: config.listener_id,
            secret: derive_secret(&config.psk),
            psk: Zeroizing::new(config.psk),
            padding_max,
            pipeline,
            authenticator,
            connection: ConnectionManager::new(mode, address),
            observer,
            rng: SmallRng::from_entropy(),
        })
    }

    /// Swap in a different handshake implementation.
    pub fn with_authenticator(mut self, authenticator: Box<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Establish the transport and authenticate.
    pub async fn initial(&mut self) -> WireResult<()> {
        self.connect().await?;
        self.authenticate(Message::default()).await?;
        Ok(())
    }

    /// Establish a fresh connection (accept in bind mode, dial in reverse).
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        self.connection.connect(self.observer.as_ref()).await
    }

    /// Create the bind-mode listener ahead of the first accept.
    ///
    /// Useful when binding port 0 and the chosen port must be published
    /// before [`Session::initial`] blocks waiting for a peer. Fails with
    /// [`ConnectError::NotBindMode`] in `tcp-reverse` mode.
    pub async fn listen(&mut self) -> Result<SocketAddr, ConnectError> {
        self.connection.listen(self.observer.as_ref()).await
    }

    pub fn mode(&self) -> Mode {
        self.connection.mode()
    }

    pub fn address(&self) -> &str {
        self.connection.address()
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn listener_id(&self) -> Uuid {
        self.listener_id
    }

    pub fn padding_max(&self) -> usize {
        self.padding_max
    }

    pub fn authenticator_name(&self) -> &'static str {
        self.authenticator.name()
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_established()
    }

    /// Address of the connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.peer_addr()
    }

    /// Read a runtime setting. Unknown keys yield a description, not an error.
    pub fn get(&self, key: &str) -> String {
        match key.to_lowercase().as_str() {
            "paddingmax" => self.padding_max.to_string(),
            "protocol" => self.to_string(),
            _ => format!("unknown client configuration setting: {key}"),
        }
    }

    /// Change a runtime setting.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        match key.to_lowercase().as_str() {
            "paddingmax" => {
                self.padding_max = value.trim().parse().map_err(|e: ParseIntError| {
                    SettingError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                        reason: e.to_string(),
                    }
                })?;
            }
            "secret" => {
                if value.is_empty() {
                    return Err(SettingError::InvalidValue {
                        key: key.to_string(),
                        value: String::new(),
                        reason: "secret must not be empty".to_string(),
                    });
                }
                self.secret = Zeroizing::new(value.as_bytes().to_vec());
            }
            _ => return Err(SettingError::UnknownSetting(key.to_string())),
        }
        Ok(())
    }

    /// Go back to the secret derived from the pre-shared key.
    pub(crate) fn reset_secret(&mut self) {
        self.secret = derive_secret(&self.psk);
    }

    #[cfg(test)]
    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode().as_str())
    }
}
