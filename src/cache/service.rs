//! Cache service orchestrating lookup and production of artifacts.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       get_artifact()                         │
//! │  1. Map resource to paths   3. Stale: transcode + commit     │
//! │  2. Classify freshness      4. Report hit/miss and sizes     │
//! └──────────────────────────────────────────────────────────────┘
//!        │                  │                       │
//!        ▼                  ▼                       ▼
//!  ┌─────────────┐   ┌─────────────┐   ┌──────────────────────────┐
//!  │ CacheLayout │   │  classify   │   │ WebpTranscoder + commit  │
//!  └─────────────┘   └─────────────┘   └──────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::CacheError;
use crate::transcode::{SourceKind, WebpTranscoder};

use super::commit::{commit_artifact, CommitOutcome};
use super::freshness::{classify, Freshness, Verdict};
use super::resource::{CacheLayout, Resource};

// =============================================================================
// Artifact
// =============================================================================

/// Whether an artifact was already cached or produced for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Hit,
    Miss,
}

impl CacheState {
    /// Value of the `cache` diagnostic header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Hit => "hit",
            CacheState::Miss => "miss",
        }
    }
}

/// A servable artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Location of the WebP file on disk
    pub path: PathBuf,

    /// Hit or miss
    pub state: CacheState,

    /// Size of the source image in bytes
    pub source_size: u64,

    /// Size of the artifact, if it could be determined
    pub artifact_size: Option<u64>,
}

impl Artifact {
    /// Artifact size divided by source size.
    ///
    /// `None` when the artifact size is unknown or the source is empty.
    pub fn compression_ratio(&self) -> Option<f64> {
        match (self.artifact_size, self.source_size) {
            (Some(artifact), source) if source > 0 => Some(artifact as f64 / source as f64),
            _ => None,
        }
    }
}

// =============================================================================
// In-flight Locks
// =============================================================================

type LockMap = Arc<StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>>;

fn lock_map(map: &LockMap) -> MutexGuard<'_, HashMap<PathBuf, Arc<Mutex<()>>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A held (or awaited) per-artifact lock.
///
/// Dropping the slot releases the lock and removes the map entry once no
/// other slot references it. This also runs when the request future is
/// cancelled while waiting, or when the slot is dropped on a blocking thread.
struct InFlightSlot {
    map: LockMap,
    key: PathBuf,
    lock: Option<Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlightSlot {
    async fn acquire(map: &LockMap, key: &Path) -> Self {
        let lock = Arc::clone(lock_map(map).entry(key.to_path_buf()).or_default());

        let mut slot = Self {
            map: Arc::clone(map),
            key: key.to_path_buf(),
            lock: Some(Arc::clone(&lock)),
            guard: None,
        };
        slot.guard = Some(lock.lock_owned().await);
        slot
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.guard.take();
        self.lock.take();

        let mut map = lock_map(&self.map);
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}

// =============================================================================
// Cache Service
// =============================================================================

/// Service resolving resources to up-to-date artifacts.
///
/// With deduplication enabled (the default), concurrent misses for the same
/// artifact are serialized: the first request transcodes, later ones wait and
/// then find a fresh artifact. Without it every miss transcodes on its own and
/// the last rename wins.
pub struct CacheService {
    /// Source and artifact roots
    layout: CacheLayout,

    /// Encoder used on misses
    transcoder: WebpTranscoder,

    /// Whether concurrent misses for one artifact are deduplicated
    dedupe: bool,

    /// Per-artifact locks for in-flight transcodes
    in_flight: LockMap,
}

impl CacheService {
    /// Create a service with the default transcoder and deduplication enabled.
    pub fn new(layout: CacheLayout) -> Self {
        Self {
            layout,
            transcoder: WebpTranscoder::new(),
            dedupe: true,
            in_flight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Use a custom transcoder.
    pub fn with_transcoder(mut self, transcoder: WebpTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Enable or disable deduplication of concurrent misses.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    /// The directory layout this service works on.
    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Return an up-to-date artifact for `resource`, producing it if needed.
    ///
    /// # Errors
    ///
    /// - [`CacheError::SourceNotFound`] if the source image does not exist
    /// - [`CacheError::UnsupportedFormat`] if the source format cannot be transcoded
    /// - [`CacheError::Io`], [`CacheError::Decode`], [`CacheError::Encode`],
    ///   [`CacheError::Commit`] or [`CacheError::Task`] on failure; any previous
    ///   artifact is left in place
    pub async fn get_artifact(&self, resource: &Resource) -> Result<Artifact, CacheError> {
        let source = self.layout.source_path(resource);
        let artifact = self.layout.artifact_path(resource);

        let freshness = classify(&source, &artifact).await?;
        debug!(
            resource = %resource.url(),
            verdict = ?freshness.verdict,
            source_size = freshness.source_size,
            "Classified"
        );

        match freshness.verdict {
            Verdict::SourceMissing => Err(CacheError::SourceNotFound {
                path: resource.request_path(),
            }),
            Verdict::Fresh => Ok(hit(artifact, &freshness)),
            Verdict::Stale => self.refresh(resource, source, artifact, freshness).await,
        }
    }

    /// Produce a new artifact for a stale resource.
    async fn refresh(
        &self,
        resource: &Resource,
        source: PathBuf,
        artifact: PathBuf,
        mut freshness: Freshness,
    ) -> Result<Artifact, CacheError> {
        let kind = SourceKind::from_extension(resource.source_extension());
        if kind == SourceKind::Unsupported {
            return Err(CacheError::UnsupportedFormat {
                path: resource.request_path(),
                extension: resource.source_extension().to_string(),
            });
        }

        let slot = if self.dedupe {
            let slot = InFlightSlot::acquire(&self.in_flight, &artifact).await;

            // Another request may have produced it while we waited
            let reclassified = classify(&source, &artifact).await;
            let early = match &reclassified {
                Ok(current) => match current.verdict {
                    Verdict::Stale => None,
                    Verdict::Fresh => Some(Ok(hit(artifact.clone(), current))),
                    Verdict::SourceMissing => Some(Err(CacheError::SourceNotFound {
                        path: resource.request_path(),
                    })),
                },
                Err(e) => Some(Err(e.clone())),
            };

            if let Some(result) = early {
                return result;
            }

            if let Ok(current) = reclassified {
                freshness = current;
            }
            Some(slot)
        } else {
            None
        };

        let start = Instant::now();
        let transcoder = self.transcoder;
        let job_source = source.clone();
        let job_artifact = artifact.clone();

        // Detached from the request: the commit finishes and the slot is
        // released even if the client goes away
        let outcome = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            commit_artifact(&job_artifact, |file| {
                transcoder.transcode(&job_source, kind, file)
            })
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))??;

        match outcome {
            CommitOutcome::NothingProduced => Err(CacheError::UnsupportedFormat {
                path: resource.request_path(),
                extension: resource.source_extension().to_string(),
            }),
            CommitOutcome::Published { size } => {
                info!(
                    resource = %resource.url(),
                    kind = %kind,
                    source_size = freshness.source_size,
                    artifact_size = size,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Artifact produced"
                );

                let artifact_size = tokio::fs::metadata(&artifact).await.ok().map(|m| m.len());
                Ok(Artifact {
                    path: artifact,
                    state: CacheState::Miss,
                    source_size: freshness.source_size,
                    artifact_size,
                })
            }
        }
    }

    /// Number of artifacts with an in-flight lock entry.
    pub fn in_flight_count(&self) -> usize {
        lock_map(&self.in_flight).len()
    }
}

fn hit(path: PathBuf, freshness: &Freshness) -> Artifact {
    Artifact {
        path,
        state: CacheState::Hit,
        source_size: freshness.source_size,
        artifact_size: Some(freshness.artifact_size),
    }
}

// =============================================================================
// Tests
// =============================================================================
