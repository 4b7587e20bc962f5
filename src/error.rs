//! Error taxonomy shared by the stores and the speech pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a speech synthesis backend.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("synthesis service returned status {0}")]
    Status(u16),

    #[error("synthesis service returned no audio")]
    EmptyAudio,

    #[error("synthesis timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// A required field was missing, empty, or out of bounds.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The submitter is on the ban list.
    #[error("source is banned")]
    Banned,

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
