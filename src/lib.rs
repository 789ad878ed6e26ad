//! # Bidirectional relay library
//!
//! Accepts local WebSocket clients and relays their JSON frames to a remote
//! bidirectional generation service, authenticating every upstream
//! connection with a cached service-account bearer token.
//!
//! Modules:
//! - `config`: service configuration and the credential document
//! - `cache`: the single cached token
//! - `sources`: service account and gcloud token sources
//! - `provider`: token provider shared by all sessions
//! - `relay`: upstream handshake, forwarding loops, sessions
//! - `server`: WebSocket listener

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod provider;
pub mod relay;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::sources::ServiceConfig;
pub use crate::error::{AuthError, ConfigError, SessionError};
pub use crate::provider::TokenProvider;
pub use crate::relay::{RelayContext, RelaySession};
pub use crate::server::ConnectionServer;
