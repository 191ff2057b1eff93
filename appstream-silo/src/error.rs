use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a cached metadata document into a silo.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read metadata document {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML (or not valid gzip).
    #[error("metadata document is unparsable at byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// A single component was malformed and `ignore_invalid` was not set.
    #[error("invalid component #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("compile cancelled")]
    Cancelled,
}

/// Errors raised while persisting or loading a compiled silo.
#[derive(Debug, Error)]
pub enum SiloError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to persist silo: {0}")]
    Persist(String),
}

impl From<bincode::Error> for SiloError {
    fn from(err: bincode::Error) -> Self {
        SiloError::Persist(err.to_string())
    }
}
