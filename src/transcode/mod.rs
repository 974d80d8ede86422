//! Source-to-WebP transcoding.
//!
//! # Components
//!
//! - [`SourceKind`]: closed classification of a source format into an encoding policy
//! - [`WebpTranscoder`]: decodes a source image and writes its WebP rendition
//!
//! ```text
//!   .jpg/.jpeg ──► decode ──► lossy WebP (quality 85)
//!   .png/.gif  ──► decode ──► lossless WebP
//!   .webp      ──────────────► byte copy
//!   other      ──────────────► nothing
//! ```

mod encoder;
mod format;

pub use encoder::{
    clamp_quality, is_valid_quality, WebpTranscoder, DEFAULT_WEBP_QUALITY, MAX_WEBP_QUALITY,
    MIN_WEBP_QUALITY,
};
pub use format::SourceKind;
