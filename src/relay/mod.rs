//! Client <-> upstream relaying.
//!
//! - `upstream`: authenticated handshake to the remote service
//! - `forward`: one-direction forwarding loop
//! - `session`: one client connection paired with one upstream connection

use std::fmt;

pub mod forward;
pub mod session;
pub mod upstream;

pub use session::{RelayContext, RelaySession, SessionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Direction::ClientToUpstream => "client_to_upstream",
            Direction::UpstreamToClient => "upstream_to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
