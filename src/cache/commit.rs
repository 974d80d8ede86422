//! Atomic publication of artifacts.
//!
//! Output is written to a uniquely named temporary file next to the final
//! artifact and renamed into place once complete and synced. The rename is the
//! only step visible to readers; every other exit path drops the
//! [`NamedTempFile`], which removes it. Directories created for an artifact
//! that ends up not being produced are removed again.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CacheError;

/// Suffix of in-progress artifact files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Result of a successful [`commit_artifact`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new artifact of `size` bytes is now visible at the final path
    Published { size: u64 },

    /// The writer produced no bytes; nothing was published
    NothingProduced,
}

/// Produce the artifact at `artifact_path` without ever exposing a partial file.
///
/// `write` receives the temporary file and returns the number of bytes it
/// wrote. Zero bytes means there was nothing to produce and the temporary file
/// is discarded. This call blocks; run it on a blocking thread.
///
/// # Errors
///
/// Returns the writer's error unchanged, or [`CacheError::Commit`] when the
/// directory, temporary file, sync or rename fails. In every error case the
/// existing file at `artifact_path` (if any) is left untouched.
pub fn commit_artifact<F>(artifact_path: &Path, write: F) -> Result<CommitOutcome, CacheError>
where
    F: FnOnce(&mut File) -> Result<u64, CacheError>,
{
    let dir = artifact_path
        .parent()
        .ok_or_else(|| CacheError::commit(artifact_path, "artifact path has no parent"))?;
    let file_name = artifact_path
        .file_name()
        .ok_or_else(|| CacheError::commit(artifact_path, "artifact path has no file name"))?;

    let created = first_missing_ancestor(dir);
    fs::create_dir_all(dir).map_err(|e| CacheError::commit(dir, e))?;

    let mut prefix = file_name.to_os_string();
    prefix.push(".");
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| CacheError::commit(artifact_path, e))?;

    let written = write(temp.as_file_mut())?;

    if written == 0 {
        debug!(path = %artifact_path.display(), "Nothing produced, discarding temporary file");
        drop(temp);
        if let Some(top) = created {
            remove_empty_dirs(dir, &top);
        }
        return Ok(CommitOutcome::NothingProduced);
    }

    temp.as_file()
        .sync_all()
        .map_err(|e| CacheError::commit(temp.path(), e))?;

    publish(temp, artifact_path)?;

    debug!(path = %artifact_path.display(), size = written, "Artifact committed");
    Ok(CommitOutcome::Published { size: written })
}

/// The outermost ancestor of `dir` (itself included) that does not exist yet.
fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .last()
        .map(Path::to_path_buf)
}

/// Remove `dir` and its parents up to and including `top` while they are empty.
fn remove_empty_dirs(dir: &Path, top: &Path) {
    for path in dir.ancestors() {
        // Fails on a non-empty directory, e.g. one a concurrent commit wrote into
        if fs::remove_dir(path).is_err() || path == top {
            break;
        }
    }
}

fn publish(temp: NamedTempFile, artifact_path: &Path) -> Result<(), CacheError> {
    temp.persist(artifact_path).map_err(|e| {
        warn!(
            path = %artifact_path.display(),
            error = %e.error,
            "Failed to rename temporary file into place"
        );
        // Dropping the returned NamedTempFile removes the temporary file
        CacheError::commit(artifact_path, e.error)
    })?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
