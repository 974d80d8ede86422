//! # WebP Cache
//!
//! An HTTP server that serves WebP renditions of JPEG, PNG and GIF images,
//! transcoding them on first request and caching the result on disk.
//!
//! ## Features
//!
//! - **On-demand transcoding**: `/a/b.jpg.webp` is produced from `/a/b.jpg`
//!   the first time it is requested
//! - **Persistent cache**: artifacts mirror the source tree and are
//!   invalidated by comparing modification times, so no index is needed
//! - **Atomic publication**: artifacts appear only once complete
//! - **Pass-through**: any other path is served verbatim from the source tree
//!
//! ## Architecture
//!
//! - [`cache`] - Path resolution, freshness checks, atomic commit, cache service
//! - [`transcode`] - Source classification and WebP encoding
//! - [`server`] - Axum-based HTTP server, access log and metrics
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use webp_cache::{create_router, CacheLayout, CacheService, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = CacheService::new(CacheLayout::new("/srv/images", "/var/cache/webp"));
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod server;
pub mod transcode;

// Re-export commonly used types
pub use cache::{
    resolve, Artifact, CacheLayout, CacheService, CacheState, Resolution, Resource, Verdict,
};
pub use config::Config;
pub use error::{CacheError, PathError};
pub use server::{create_router, AppState, RouterConfig};
pub use transcode::{SourceKind, WebpTranscoder};
