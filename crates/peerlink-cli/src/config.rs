//! Agent configuration loaded from `~/.peerlink/agent.toml`.

use anyhow::Context;
use peerlink_wire::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Default pause between check-ins.
pub const DEFAULT_SLEEP_SECS: u64 = 30;

/// Top-level agent configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default = "default_transport")]
    pub transport: TransportConfig,
}

/// The `[agent]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Agent id; generated at startup when absent.
    pub id: Uuid,
    /// Seconds between check-ins.
    pub sleep_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            sleep_secs: DEFAULT_SLEEP_SECS,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            transport: default_transport(),
        }
    }
}

fn default_transport() -> TransportConfig {
    TransportConfig {
        address: vec!["127.0.0.1:4444".to_string()],
        auth: "opaque".to_string(),
        transforms: "jwe,gob-base".to_string(),
        mode: "tcp-bind".to_string(),
        ..Default::default()
    }
}

impl AgentConfig {
    /// Transport settings carrying the agent id, generating one if needed.
    pub fn transport_for_agent(&mut self) -> TransportConfig {
        if self.agent.id.is_nil() {
            self.agent.id = Uuid::new_v4();
            info!(agent = %self.agent.id, "No agent id configured, generated one");
        }
        TransportConfig {
            agent_id: self.agent.id,
            ..self.transport.clone()
        }
    }
}

/// `~/.peerlink/agent.toml`, or the same under the temp dir without a home.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".peerlink")
        .join("agent.toml")
}

/// Load the agent configuration. A missing file yields the defaults; an
/// unreadable or malformed one is an error.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        return Ok(AgentConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config: AgentConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    info!(path = %config_path.display(), "Loaded configuration");
    Ok(config)
}
