//! Message exchange: one request/response round trip.

use crate::error::SendError;
use crate::observer::SessionEvent;
use crate::session::Session;
use peerlink_types::message::encode_delegate;
use peerlink_types::{Delegate, Message};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest response that can be received in one round trip.
pub const READ_CEILING: usize = 500_000;

/// Random alphanumeric filler whose length is uniform in `[0, max)`.
pub(crate) fn random_padding<R: Rng>(rng: &mut R, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let len = rng.gen_range(0..max);
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Errors meaning the peer is gone and the connection is unusable.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

impl Session {
    /// Send one message and wait for the peer's reply.
    ///
    /// Reconnects first if the previous round trip saw the peer go away.
    /// Exactly one reply is returned today; the list leaves room for more.
    pub async fn send(&mut self, mut msg: Message) -> Result<Vec<Message>, SendError> {
        if self.padding_max > 0 {
            msg.padding = random_padding(&mut self.rng, self.padding_max);
        }
        let kind = msg.kind;

        let payload = self
            .pipeline
            .construct(msg, &self.secret)
            .map_err(SendError::Construct)?;
        let envelope = encode_delegate(&Delegate {
            listener: self.listener_id,
            agent: self.agent_id,
            payload,
        })?;

        let mut conn = self
            .connection
            .take_or_connect(self.observer.as_ref())
            .await?;
        let peer = conn.peer;

        self.observer.on_event(&SessionEvent::Sending {
            kind,
            peer,
            bytes: envelope.len(),
        });
        let written = match conn.stream.write_all(&envelope).await {
            Ok(()) => conn.stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(source) = written {
            if is_disconnect(&source) {
                self.observer.on_event(&SessionEvent::PeerReset { peer });
            } else {
                self.connection.restore(conn);
            }
            return Err(SendError::Write { peer, source });
        }

        let mut buf = vec![0u8; READ_CEILING];
        let n = match conn.stream.read(&mut buf).await {
            Ok(0) => {
                self.observer.on_event(&SessionEvent::PeerReset { peer });
                return Err(SendError::PeerReset { peer });
            }
            Ok(n) => n,
            Err(e) if is_disconnect(&e) => {
                self.observer.on_event(&SessionEvent::PeerReset { peer });
                return Err(SendError::PeerReset { peer });
            }
            Err(source) => {
                self.connection.restore(conn);
                return Err(SendError::Read { peer, source });
            }
        };
        self.connection.restore(conn);
        self.observer.on_event(&SessionEvent::Received { peer, bytes: n });

        let reply = self
            .pipeline
            .deconstruct(&buf[..n], &self.secret)
            .map_err(SendError::Deconstruct)?;
        Ok(vec![reply])
    }
}
