//! Cache freshness classification.
//!
//! An artifact is fresh when it exists and its modification time is strictly
//! after the source's. The check is a point-in-time snapshot: a source
//! rewritten between classification and serving is picked up by the next
//! request.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::CacheError;

/// Cache-validity verdict for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Artifact exists and is newer than the source
    Fresh,

    /// Artifact is missing or not newer than the source
    Stale,

    /// Source image does not exist
    SourceMissing,
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub verdict: Verdict,

    /// Size of the source in bytes (0 when missing)
    pub source_size: u64,

    /// Size of the artifact in bytes (0 when missing)
    pub artifact_size: u64,
}

impl Freshness {
    fn source_missing() -> Self {
        Self {
            verdict: Verdict::SourceMissing,
            source_size: 0,
            artifact_size: 0,
        }
    }
}

/// Compare source and artifact metadata.
///
/// # Errors
///
/// Returns [`CacheError::Io`] when the source exists but cannot be stat'ed
/// (permissions, unsupported mtime, ...). A missing source is reported through
/// [`Verdict::SourceMissing`], not as an error.
pub async fn classify(source_path: &Path, artifact_path: &Path) -> Result<Freshness, CacheError> {
    let source = match tokio::fs::metadata(source_path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            debug!(path = %source_path.display(), "Source is not a regular file");
            return Ok(Freshness::source_missing());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %source_path.display(), "Source not found");
            return Ok(Freshness::source_missing());
        }
        Err(e) => return Err(CacheError::io(source_path, e)),
    };

    let source_size = source.len();

    let artifact = match tokio::fs::metadata(artifact_path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            return Ok(Freshness {
                verdict: Verdict::Stale,
                source_size,
                artifact_size: 0,
            })
        }
    };

    let source_mtime = source
        .modified()
        .map_err(|e| CacheError::io(source_path, e))?;
    let artifact_mtime = artifact
        .modified()
        .map_err(|e| CacheError::io(artifact_path, e))?;

    let verdict = if artifact_mtime > source_mtime {
        Verdict::Fresh
    } else {
        Verdict::Stale
    };

    Ok(Freshness {
        verdict,
        source_size,
        artifact_size: artifact.len(),
    })
}

// =============================================================================
// Tests
// =============================================================================
