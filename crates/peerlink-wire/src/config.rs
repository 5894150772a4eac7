//! Session configuration and its validation.
//!
//! [`TransportConfig`] carries the raw, mostly-string values an operator
//! supplies. [`Session::new`](crate::Session::new) validates every field and
//! refuses to construct a session from a bad one.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::ToSocketAddrs;
use uuid::Uuid;

/// Raw transport settings as written in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Endpoints to bind or dial; only the first is used.
    pub address: Vec<String>,
    /// This agent's id.
    pub agent_id: Uuid,
    /// Id of the server-side listener this agent belongs to.
    pub listener_id: Uuid,
    /// Authenticator name: `opaque` or `none`.
    pub auth: String,
    /// Maximum random padding length, as a decimal string; empty means 0.
    pub padding: String,
    /// Pre-shared key used until authentication completes.
    pub psk: String,
    /// Comma-separated transform stage names, outermost first.
    pub transforms: String,
    /// `tcp-bind` or `tcp-reverse`.
    pub mode: String,
}

/// How the session establishes its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Listen on the address and accept one peer at a time.
    Bind,
    /// Dial the address.
    Reverse,
}

impl Mode {
    /// Parse a configured mode name (case-insensitive).
    ///
    /// Returns `None` for unrecognised names; callers fall back to
    /// [`Mode::Bind`].
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "tcp-bind" => Some(Mode::Bind),
            "tcp-reverse" => Some(Mode::Reverse),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Bind => "tcp-bind",
            Mode::Reverse => "tcp-reverse",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate the first configured address and return it in bindable form.
///
/// A bare `:port` means every interface, as it does for most listeners.
pub fn validate_address(addresses: &[String]) -> Result<String, ConfigError> {
    let first = addresses.first().ok_or(ConfigError::MissingAddress)?;
    let address = if first.starts_with(':') {
        format!("0.0.0.0{first}")
    } else {
        first.clone()
    };

    let mut resolved = address
        .to_socket_addrs()
        .map_err(|e| ConfigError::InvalidAddress {
            address: first.clone(),
            reason: e.to_string(),
        })?;
    if resolved.next().is_none() {
        return Err(ConfigError::InvalidAddress {
            address: first.clone(),
            reason: "address resolved to nothing".to_string(),
        });
    }
    Ok(address)
}

/// Parse the padding bound; an empty value means no padding.
pub fn parse_padding(value: &str) -> Result<usize, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<usize>()
        .map_err(|source| ConfigError::InvalidPadding {
            value: value.to_string(),
            source,
        })
}
