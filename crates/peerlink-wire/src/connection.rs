//! Connection manager: owns the listener and the live connection.
//!
//! In bind mode the listener is created once and reused; each call to
//! [`ConnectionManager::connect`] accepts exactly one new peer. In reverse
//! mode each call dials the configured address. The live connection sits in
//! a [`Link`] slot that only this module and the message exchange change.

use crate::config::Mode;
use crate::error::ConnectError;
use crate::observer::{SessionEvent, SessionObserver};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

/// An established TCP connection and the peer it reaches.
#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) stream: TcpStream,
    pub(crate) peer: SocketAddr,
}

/// State of the connection slot.
#[derive(Debug)]
pub(crate) enum Link {
    Unestablished,
    Established(Connection),
}

/// Establishes and tracks the session's transport.
#[derive(Debug)]
pub struct ConnectionManager {
    mode: Mode,
    address: String,
    listener: Option<TcpListener>,
    link: Link,
}

impl ConnectionManager {
    pub fn new(mode: Mode, address: String) -> Self {
        Self {
            mode,
            address,
            listener: None,
            link: Link::Unestablished,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether a connection is currently held.
    pub fn is_established(&self) -> bool {
        matches!(self.link, Link::Established(_))
    }

    /// Address of the connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.link {
            Link::Established(conn) => Some(conn.peer),
            Link::Unestablished => None,
        }
    }

    /// Local address of the bind-mode listener, once it exists.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Create the bind-mode listener without waiting for a peer.
    ///
    /// Idempotent. Returns the bound local address. Reverse mode holds no
    /// listener, so this fails there.
    pub async fn listen(
        &mut self,
        observer: &dyn SessionObserver,
    ) -> Result<SocketAddr, ConnectError> {
        if self.mode != Mode::Bind {
            return Err(ConnectError::NotBindMode {
                address: self.address.clone(),
            });
        }
        let listener = self.take_or_bind(observer).await?;
        let local = listener.local_addr().map_err(|source| ConnectError::Listen {
            address: self.address.clone(),
            source,
        });
        self.listener = Some(listener);
        local
    }

    /// Establish a fresh connection, replacing any existing one.
    pub async fn connect(&mut self, observer: &dyn SessionObserver) -> Result<(), ConnectError> {
        self.link = Link::Unestablished;
        let conn = self.establish(observer).await?;
        self.link = Link::Established(conn);
        Ok(())
    }

    /// Drop the current connection, if any.
    pub fn reset(&mut self) {
        self.link = Link::Unestablished;
    }

    /// Take the live connection out of the slot, establishing one first if
    /// the slot is empty.
    pub(crate) async fn take_or_connect(
        &mut self,
        observer: &dyn SessionObserver,
    ) -> Result<Connection, ConnectError> {
        match std::mem::replace(&mut self.link, Link::Unestablished) {
            Link::Established(conn) => Ok(conn),
            Link::Unestablished => {
                observer.on_event(&SessionEvent::Reconnecting);
                self.establish(observer).await
            }
        }
    }

    /// Put a still-healthy connection back into the slot.
    pub(crate) fn restore(&mut self, conn: Connection) {
        self.link = Link::Established(conn);
    }

    async fn take_or_bind(
        &mut self,
        observer: &dyn SessionObserver,
    ) -> Result<TcpListener, ConnectError> {
        if let Some(listener) = self.listener.take() {
            return Ok(listener);
        }
        let listener = TcpListener::bind(self.address.as_str())
            .await
            .map_err(|source| ConnectError::Listen {
                address: self.address.clone(),
                source,
            })?;
        if let Ok(local) = listener.local_addr() {
            observer.on_event(&SessionEvent::Listening { local });
        }
        Ok(listener)
    }

    async fn establish(
        &mut self,
        observer: &dyn SessionObserver,
    ) -> Result<Connection, ConnectError> {
        let conn = match self.mode {
            Mode::Bind => {
                let listener = self.take_or_bind(observer).await?;
                observer.on_event(&SessionEvent::AwaitingPeer);
                let accepted = listener.accept().await;
                self.listener = Some(listener);
                let (stream, peer) = accepted.map_err(|source| ConnectError::Accept {
                    address: self.address.clone(),
                    source,
                })?;
                Connection { stream, peer }
            }
            Mode::Reverse => {
                let dial_err = |source| ConnectError::Dial {
                    address: self.address.clone(),
                    source,
                };
                let stream = TcpStream::connect(self.address.as_str())
                    .await
                    .map_err(dial_err)?;
                let peer = stream.peer_addr().map_err(dial_err)?;
                Connection { stream, peer }
            }
        };
        observer.on_event(&SessionEvent::Connected { peer: conn.peer });
        Ok(conn)
    }
}
