use std::path::Path;

use thiserror::Error;

/// Errors produced while mapping a request path onto the cache layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path is empty or does not start with `/`
    #[error("Path must be non-empty and start with '/': {0:?}")]
    NotRooted(String),

    /// Path contains a parent-directory or otherwise unsafe segment
    #[error("Path contains a forbidden segment: {0}")]
    Traversal(String),

    /// Percent-decoding produced invalid UTF-8
    #[error("Path is not valid UTF-8 after decoding: {0}")]
    InvalidEncoding(String),
}

/// Errors that can occur while looking up, producing or committing an artifact
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The source image does not exist (should map to HTTP 404)
    #[error("File not found: {path}")]
    SourceNotFound { path: String },

    /// The source format has no transcoding policy (should map to HTTP 404)
    #[error("Unsupported source format {extension:?}: {path}")]
    UnsupportedFormat { path: String, extension: String },

    /// Source bytes could not be decoded as an image
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    /// Encoder failed or the encoded bytes could not be written
    #[error("Failed to encode {path}: {message}")]
    Encode { path: String, message: String },

    /// Creating the artifact directory, syncing or renaming failed
    #[error("Failed to commit artifact {path}: {message}")]
    Commit { path: String, message: String },

    /// Any other filesystem error
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// The blocking transcode task panicked or was cancelled
    #[error("Transcode task failed: {0}")]
    Task(String),
}

impl CacheError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn commit(path: &Path, err: impl std::fmt::Display) -> Self {
        CacheError::Commit {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Whether this error should be reported as "not found" to the client.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::SourceNotFound { .. } | CacheError::UnsupportedFormat { .. }
        )
    }
}
