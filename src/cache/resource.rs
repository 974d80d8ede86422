//! Request path resolution.
//!
//! Maps an incoming URL path onto a [`Resource`] and, through a
//! [`CacheLayout`], onto concrete source and artifact paths:
//!
//! ```text
//! /photos/cat.jpg.webp
//!   resource.path  = /photos/cat.jpg
//!   source_path    = <source_root>/photos/cat.jpg
//!   artifact_path  = <artifact_root>/photos/cat.jpg.webp
//! ```
//!
//! Requests that do not end in `.webp`, or whose remaining file name has no
//! extension of its own, are not transcodable and resolve to
//! [`Resolution::PassThrough`].

use std::path::PathBuf;

use crate::error::PathError;

/// Extension (without the dot) of the format every artifact is stored in.
pub const TARGET_EXTENSION: &str = "webp";

/// Host recorded on every resource. Only a single local origin is served.
pub const DEFAULT_RESOURCE_HOST: &str = "localhost";

// =============================================================================
// Resource
// =============================================================================

/// One logical image, independent of its cache state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Origin host (currently always [`DEFAULT_RESOURCE_HOST`])
    pub host: String,

    /// Normalized, rooted path without the trailing `.webp` segment
    pub path: String,
}

impl Resource {
    /// Create a resource for `path` on the default host.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_RESOURCE_HOST.to_string(),
            path: path.into(),
        }
    }

    /// The request path this resource was resolved from.
    pub fn request_path(&self) -> String {
        format!("{}.{}", self.path, TARGET_EXTENSION)
    }

    /// Absolute URL of the source image.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.host, self.path)
    }

    /// Extension of the source file, e.g. `jpg` for `/a/b.jpg`.
    pub fn source_extension(&self) -> &str {
        file_extension(&self.path).unwrap_or("")
    }

    /// Path relative to either root, without the leading slash.
    fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The request names a WebP rendition of a source image
    Transcode(Resource),

    /// The request should be served verbatim from the source root
    PassThrough,
}

/// Resolve a raw (percent-encoded) URL path.
///
/// # Errors
///
/// - [`PathError::NotRooted`] if the path is empty or relative
/// - [`PathError::InvalidEncoding`] if it does not decode to UTF-8
/// - [`PathError::Traversal`] if any segment is `..` or contains a backslash
pub fn resolve(request_path: &str) -> Result<Resolution, PathError> {
    if !request_path.starts_with('/') {
        return Err(PathError::NotRooted(request_path.to_string()));
    }

    let decoded = urlencoding::decode(request_path)
        .map_err(|_| PathError::InvalidEncoding(request_path.to_string()))?;

    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal(request_path.to_string())),
            s if s.contains('\\') || s.contains('\0') => {
                return Err(PathError::Traversal(request_path.to_string()))
            }
            s => segments.push(s),
        }
    }

    let Some(file_name) = segments.pop() else {
        return Ok(Resolution::PassThrough);
    };

    match file_extension(file_name) {
        Some(ext) if ext.eq_ignore_ascii_case(TARGET_EXTENSION) => {}
        _ => return Ok(Resolution::PassThrough),
    }

    let stem = &file_name[..file_name.len() - TARGET_EXTENSION.len() - 1];
    if file_extension(stem).map_or(true, str::is_empty) {
        return Ok(Resolution::PassThrough);
    }

    segments.push(stem);
    Ok(Resolution::Transcode(Resource::new(format!(
        "/{}",
        segments.join("/")
    ))))
}

/// Extension after the final `.` of the last path segment, if any.
fn file_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').map(|idx| &name[idx + 1..])
}

// =============================================================================
// Cache Layout
// =============================================================================

/// The two directory trees a resource maps into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    /// Root of the original images
    pub source_root: PathBuf,

    /// Root under which WebP artifacts mirror the source tree
    pub artifact_root: PathBuf,
}

impl CacheLayout {
    /// Create a layout from the two roots.
    pub fn new(source_root: impl Into<PathBuf>, artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            artifact_root: artifact_root.into(),
        }
    }

    /// Location of the original image for `resource`.
    pub fn source_path(&self, resource: &Resource) -> PathBuf {
        self.source_root.join(resource.relative_path())
    }

    /// Location of the cached WebP rendition for `resource`.
    pub fn artifact_path(&self, resource: &Resource) -> PathBuf {
        let mut relative = resource.relative_path().to_string();
        relative.push('.');
        relative.push_str(TARGET_EXTENSION);
        self.artifact_root.join(relative)
    }
}

// =============================================================================
// Tests
// =============================================================================
