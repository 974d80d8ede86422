//! WebP transcoder.
//!
//! Decodes a source image and writes its WebP rendition to a destination
//! stream. The encoding policy depends on the [`SourceKind`]:
//!
//! - **Lossy** (JPEG): lossy WebP at the configured quality. The source has
//!   already lost detail, so a lossless re-encode would only inflate it.
//! - **Lossless** (PNG, GIF): lossless WebP, exact pixel reproduction. Only the
//!   first GIF frame is kept.
//! - **AlreadyTarget** (WebP): plain byte copy, no decode.
//! - **Unsupported**: nothing is written.
//!
//! Lossy output goes through libwebp (`webp` crate); lossless output uses the
//! pure-Rust encoder shipped with `image`, which only supports lossless mode.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageReader};
use tracing::{debug, warn};

use crate::error::CacheError;

use super::format::SourceKind;

/// Default lossy WebP quality (1-100).
pub const DEFAULT_WEBP_QUALITY: u8 = 85;

/// Minimum allowed WebP quality.
pub const MIN_WEBP_QUALITY: u8 = 1;

/// Maximum allowed WebP quality.
pub const MAX_WEBP_QUALITY: u8 = 100;

// =============================================================================
// WebP Transcoder
// =============================================================================

/// Stateless transcoder from source images to WebP.
///
/// # Example
///
/// ```ignore
/// use webp_cache::transcode::{SourceKind, WebpTranscoder};
///
/// let transcoder = WebpTranscoder::new();
/// let mut out = Vec::new();
/// let written = transcoder.transcode(Path::new("cat.jpg"), SourceKind::Lossy, &mut out)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WebpTranscoder {
    quality: u8,
}

impl Default for WebpTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebpTranscoder {
    /// Create a transcoder using [`DEFAULT_WEBP_QUALITY`] for lossy output.
    pub fn new() -> Self {
        Self {
            quality: DEFAULT_WEBP_QUALITY,
        }
    }

    /// Create a transcoder with a custom lossy quality (clamped to 1-100).
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    /// Quality used for lossy output.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Write the WebP rendition of `source` into `dst`.
    ///
    /// Returns the number of bytes written; `0` for [`SourceKind::Unsupported`].
    ///
    /// # Errors
    ///
    /// - [`CacheError::SourceNotFound`] if the source vanished
    /// - [`CacheError::Decode`] if the source is not a readable image
    /// - [`CacheError::Encode`] if encoding or writing to `dst` fails
    pub fn transcode<W: Write>(
        &self,
        source: &Path,
        kind: SourceKind,
        dst: &mut W,
    ) -> Result<u64, CacheError> {
        debug!(src = %source.display(), kind = %kind, "Transcoding");

        match kind {
            SourceKind::Unsupported => Ok(0),
            SourceKind::AlreadyTarget => {
                let mut file = File::open(source).map_err(|e| open_error(source, e))?;
                io::copy(&mut file, dst).map_err(|e| encode_error(source, e))
            }
            SourceKind::Lossy | SourceKind::Lossless => {
                let img = decode(source)?;
                let encoded = self
                    .encode(&img, kind == SourceKind::Lossless)
                    .map_err(|message| CacheError::Encode {
                        path: source.display().to_string(),
                        message,
                    })?;
                dst.write_all(&encoded)
                    .map_err(|e| encode_error(source, e))?;
                Ok(encoded.len() as u64)
            }
        }
    }

    /// Encode a decoded image as WebP.
    pub fn encode(&self, img: &DynamicImage, lossless: bool) -> Result<Vec<u8>, String> {
        if lossless {
            let rgba = img.to_rgba8();
            let mut output = Vec::new();
            WebPEncoder::new_lossless(&mut output)
                .encode(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| e.to_string())?;
            Ok(output)
        } else {
            let rgb = img.to_rgb8();
            let encoder = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height());
            let memory = encoder
                .encode_simple(false, self.quality as f32)
                .map_err(|e| format!("{:?}", e))?;
            Ok(memory.to_vec())
        }
    }
}

/// Load and decode an image, guessing its format from the content.
fn decode(source: &Path) -> Result<DynamicImage, CacheError> {
    let reader = ImageReader::open(source)
        .map_err(|e| open_error(source, e))?
        .with_guessed_format()
        .map_err(|e| decode_error(source, e))?;

    reader.decode().map_err(|e| {
        warn!(src = %source.display(), error = %e, "Failed to decode source image");
        decode_error(source, e)
    })
}

fn open_error(source: &Path, err: io::Error) -> CacheError {
    if err.kind() == io::ErrorKind::NotFound {
        CacheError::SourceNotFound {
            path: source.display().to_string(),
        }
    } else {
        CacheError::io(source, err)
    }
}

fn decode_error(source: &Path, err: impl std::fmt::Display) -> CacheError {
    CacheError::Decode {
        path: source.display().to_string(),
        message: err.to_string(),
    }
}

fn encode_error(source: &Path, err: io::Error) -> CacheError {
    CacheError::Encode {
        path: source.display().to_string(),
        message: err.to_string(),
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate WebP quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_WEBP_QUALITY..=MAX_WEBP_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_WEBP_QUALITY, MAX_WEBP_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
