//! On-disk WebP artifact cache.
//!
//! Artifacts mirror the source tree: `<src>/a/b.jpg` is cached as
//! `<dst>/a/b.jpg.webp`. Validity is decided purely from file metadata, so the
//! cache survives restarts and needs no index.
//!
//! ```text
//! request path ──► resolve() ──► Resource ──► CacheService::get_artifact()
//!                                                  │
//!                          ┌───────────────────────┼────────────────────┐
//!                          ▼                       ▼                    ▼
//!                     classify()            WebpTranscoder      commit_artifact()
//!                   (mtime compare)        (decode + encode)   (temp file + rename)
//! ```

mod commit;
mod freshness;
mod resource;
mod service;

pub use commit::{commit_artifact, CommitOutcome, TEMP_SUFFIX};
pub use freshness::{classify, Freshness, Verdict};
pub use resource::{
    resolve, CacheLayout, Resolution, Resource, DEFAULT_RESOURCE_HOST, TARGET_EXTENSION,
};
pub use service::{Artifact, CacheService, CacheState};
