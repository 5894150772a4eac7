//! The authentication loop.

use crate::error::AuthError;
use crate::observer::SessionEvent;
use crate::session::Session;
use peerlink_types::Message;
use zeroize::Zeroizing;

impl Session {
    /// Drive the configured authenticator until it reports success.
    ///
    /// Each round feeds the authenticator the peer's last reply and sends
    /// whatever it produces. The secret starts from the pre-shared key; when
    /// the final round yields a negotiated key, that key protects the final
    /// message and all later traffic.
    pub async fn authenticate(&mut self, msg: Message) -> Result<(), AuthError> {
        self.reset_secret();
        let mut msg = msg;
        loop {
            let (response, authenticated) = self.authenticator.authenticate(msg)?;

            if authenticated {
                let key = self.authenticator.secret()?;
                if !key.is_empty() {
                    self.secret = Zeroizing::new(key);
                    self.observer.on_event(&SessionEvent::SecretRotated);
                }
            }

            let replies = self.send(response.clone()).await?;
            msg = replies.into_iter().next().unwrap_or(response);

            if authenticated {
                self.observer.on_event(&SessionEvent::Authenticated {
                    authenticator: self.authenticator.name(),
                });
                return Ok(());
            }
        }
    }
}
