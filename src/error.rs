//! Error types for imbow.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or querying an image index.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// File cannot be opened, read or written, or its on-disk layout is
    /// damaged (malformed trailer, record type mismatch).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing required key, unknown registered name, or an invalid
    /// numeric parameter.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Dimension or length mismatch between related containers.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    Shape {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Operation not permitted in the current state (e.g. querying a
    /// non-finalized index).
    #[error("invalid state: {0}")]
    State(String),

    /// A descriptor generator failed on a specific input image.
    #[error("descriptor computation failed for {path}: {reason}")]
    Compute { path: PathBuf, reason: String },
}

impl RetrievalError {
    /// An [`RetrievalError::Io`] describing a malformed or mistyped file.
    ///
    /// Used where the underlying stream is intact but its contents are not
    /// what the caller asked for (bad trailer, wrong record type tag).
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        RetrievalError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }
}

/// Result type alias for imbow operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
