//! Source format classification.

use std::fmt;

/// How a source image is turned into a WebP artifact.
///
/// Resolved once per request from the source file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Lossy source (JPEG): re-encode lossy at the configured quality
    Lossy,

    /// Lossless-capable source (PNG, GIF): re-encode losslessly
    Lossless,

    /// Already WebP: copy byte for byte
    AlreadyTarget,

    /// No policy for this format; nothing is produced
    Unsupported,
}

impl SourceKind {
    /// Classify a file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => SourceKind::Lossy,
            "png" | "gif" => SourceKind::Lossless,
            "webp" => SourceKind::AlreadyTarget,
            _ => SourceKind::Unsupported,
        }
    }

    /// Short identifier used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Lossy => "lossy",
            SourceKind::Lossless => "lossless",
            SourceKind::AlreadyTarget => "copy",
            SourceKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
