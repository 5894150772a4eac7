//! peerlink-agent: runs one peer transport session and checks in on a timer.

mod config;

use anyhow::Context;
use clap::Parser;
use peerlink_types::{Message, MessageType};
use peerlink_wire::{SendError, Session};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "peerlink-agent",
    version,
    about = "Agent-side peer-to-peer TCP transport"
)]
struct Cli {
    /// Path to config file (default: ~/.peerlink/agent.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind or dial, overriding the config file.
    #[arg(long)]
    address: Option<String>,

    /// `tcp-bind` or `tcp-reverse`.
    #[arg(long)]
    mode: Option<String>,

    /// Pre-shared key.
    #[arg(long)]
    psk: Option<String>,

    /// Listener id the agent belongs to.
    #[arg(long)]
    listener: Option<Uuid>,

    /// Check in once and exit.
    #[arg(long)]
    once: bool,
}

fn init_tracing_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_stderr();

    let mut agent_config = config::load_config(cli.config.as_deref())?;
    if let Some(address) = cli.address {
        agent_config.transport.address = vec![address];
    }
    if let Some(mode) = cli.mode {
        agent_config.transport.mode = mode;
    }
    if let Some(psk) = cli.psk {
        agent_config.transport.psk = psk;
    }
    if let Some(listener) = cli.listener {
        agent_config.transport.listener_id = listener;
    }

    let transport = agent_config.transport_for_agent();
    let mut session = Session::new(transport).context("invalid transport configuration")?;
    info!(
        agent = %session.agent_id(),
        protocol = %session,
        address = session.address(),
        "Starting agent"
    );

    session
        .initial()
        .await
        .context("failed to establish the session")?;

    if cli.once {
        return check_in(&mut session).await;
    }

    let sleep = Duration::from_secs(agent_config.agent.sleep_secs.max(1));
    loop {
        if let Err(e) = check_in(&mut session).await {
            error!(error = %e, "Check-in failed");
        }
        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
        }
    }
}

/// Send one check-in and act on the replies.
async fn check_in(session: &mut Session) -> anyhow::Result<()> {
    let msg = Message::new(session.agent_id(), MessageType::Checkin);
    let replies = match session.send(msg).await {
        Ok(replies) => replies,
        Err(SendError::PeerReset { peer }) => {
            warn!(%peer, "Peer went away, will reconnect on the next check-in");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for reply in replies {
        match reply.kind {
            MessageType::Opaque => {
                info!("Peer requested re-authentication");
                session
                    .authenticate(reply)
                    .await
                    .context("re-authentication failed")?;
            }
            MessageType::Jobs => {
                info!(bytes = reply.payload.len(), "Received jobs");
            }
            MessageType::Idle | MessageType::Checkin => debug!(kind = %reply.kind, "Nothing to do"),
        }
    }
    Ok(())
}
