//! Error taxonomy shared by the relay.
//!
//! `ConfigError` is fatal at startup, `AuthError` and `SessionError` are
//! fatal for one session only. Everything that happens inside a forwarding
//! loop is handled locally and never surfaces here.

use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config format: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config is not valid: {}", .0.join("; "))]
    InvalidSettings(Vec<String>),

    #[error("service account file not found: {path}")]
    CredentialNotFound { path: PathBuf },

    #[error("invalid JSON in service account file {path}: {source}")]
    MalformedCredential {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("service account file {path} is missing required field '{field}'")]
    MissingIdentity { path: PathBuf, field: String },

    #[error("service account private key is not a valid RSA PEM key: {0}")]
    InvalidKey(String),

    #[error("no token source configured")]
    NoTokenSources,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token source available")]
    NoSources,

    #[error("token refresh failed: {}", .failures.join("; "))]
    Refresh { failures: Vec<String> },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("upstream rejected handshake with status {status}")]
    UpstreamRejected { status: StatusCode },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("cannot build upstream request: {0}")]
    InvalidUpstream(String),
}
