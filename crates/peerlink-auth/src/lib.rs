//! Handshake authenticators for the peerlink agent transport.
//!
//! - `none`: authenticated on the first round, no negotiated key.
//! - `opaque`: two-round keyed challenge-response that rotates the session
//!   secret to a freshly derived key.

pub mod challenge;
pub mod none;

pub use challenge::{AuthFrame, ChallengeAuthenticator, ChallengeResponder};
pub use none::NoneAuthenticator;

use peerlink_types::Authenticator;
use uuid::Uuid;

/// Every authenticator name understood by [`authenticator_by_name`].
pub const AUTHENTICATOR_NAMES: [&str; 2] = ["opaque", "none"];

/// Build an authenticator from its configuration name (case-insensitive).
pub fn authenticator_by_name(
    name: &str,
    agent_id: Uuid,
    psk: &str,
) -> Option<Box<dyn Authenticator>> {
    match name.trim().to_lowercase().as_str() {
        "opaque" => Some(Box::new(ChallengeAuthenticator::new(agent_id, psk))),
        "none" => Some(Box::new(NoneAuthenticator::new(agent_id))),
        _ => None,
    }
}
