//! Error taxonomy for persisted release state.

use std::path::PathBuf;

/// Shipyard state errors.
///
/// Everything here is fatal to a pipeline run: a corrupt or unreadable
/// version/config file is never recovered from locally.
#[derive(Debug, thiserror::Error)]
pub enum ShipyardError {
    #[error("version state at {path} is unreadable: {reason}")]
    VersionState { path: PathBuf, reason: String },

    #[error("configuration at {path} is invalid: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("unknown increment kind '{0}': expected major, minor, patch or build")]
    UnknownIncrement(String),

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Shipyard state operations.
pub type Result<T> = std::result::Result<T, ShipyardError>;
