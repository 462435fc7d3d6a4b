//! Fatal pipeline errors.
//!
//! Expected failures (a command exiting non-zero, a rejected release) are
//! reported as stage outcomes. Only conditions that make continuing unsafe
//! surface here.

use std::path::PathBuf;

use shipyard_core::ShipyardError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    State(#[from] ShipyardError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
