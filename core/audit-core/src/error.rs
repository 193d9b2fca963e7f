//! Error types for the audit core.
//!
//! None of these are fatal once the monitor is running: the ticker turns
//! provider errors into inactive samples and the lifecycle controller logs
//! store errors and moves on.

use std::path::PathBuf;

use crate::types::SessionId;

/// Failures reported by a [`SessionStore`](crate::store::SessionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Session store rejected the record: {0}")]
    ConstraintViolation(String),

    #[error("No open session record with id {0}")]
    NotFound(SessionId),
}

/// Failures acquiring a connection table snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Failed to run connection table command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection table command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Failures loading or validating the TOML configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
