//! Configuration management for the WebP cache.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `WEBP_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use webp_cache::config::Config;
//!
//! let config = Config::parse();
//! println!("Listening on {}", config.bind_address());
//! println!("Serving {}", config.image_src_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! - `WEBP_HOST` - Server bind address (default: 0.0.0.0)
//! - `WEBP_PORT` - Server port (default: 8080)
//! - `WEBP_SERVER_NAME` - `Server` response header (default: webp-cache)
//! - `WEBP_IMAGE_SRC_DIR` - Directory holding the source images (required)
//! - `WEBP_IMAGE_DST_DIR` - Directory holding the WebP artifacts (required)
//! - `WEBP_QUALITY` - Lossy WebP quality (default: 85)
//! - `WEBP_MAX_AGE` - Cache-Control max-age for WebP responses (default: 86400)
//! - `WEBP_HEADER_CACHE_INFO` - Add `cache*` diagnostic headers (default: false)
//! - `WEBP_DEDUPE_TRANSCODES` - Serialize concurrent misses per artifact (default: true)
//! - `WEBP_REQUEST_TIMEOUT` - Request deadline in seconds (default: 5)
//! - `WEBP_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)
//! - `WEBP_LOG_LEVEL` - trace, debug, info, warn or error (default: info)

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::transcode::{is_valid_quality, DEFAULT_WEBP_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default `Server` header value.
pub const DEFAULT_SERVER_NAME: &str = "webp-cache";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// =============================================================================
// CLI Arguments
// =============================================================================

/// WebP Cache - serves WebP renditions of JPEG, PNG and GIF images.
///
/// A request for `/path/image.jpg.webp` transcodes `<src>/path/image.jpg` on
/// first access and stores the result under `<dst>/path/image.jpg.webp`. Later
/// requests are served from disk until the source changes.
#[derive(Parser, Debug, Clone)]
#[command(name = "webp-cache")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "WEBP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "WEBP_PORT")]
    pub port: u16,

    /// Value of the `Server` response header.
    #[arg(long, default_value = DEFAULT_SERVER_NAME, env = "WEBP_SERVER_NAME")]
    pub server_name: String,

    /// Request deadline in seconds.
    ///
    /// A transcode still running at the deadline completes in the background.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "WEBP_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory containing the source images.
    #[arg(long, env = "WEBP_IMAGE_SRC_DIR")]
    pub image_src_dir: PathBuf,

    /// Directory where WebP artifacts are stored. Created if missing.
    #[arg(long, env = "WEBP_IMAGE_DST_DIR")]
    pub image_dst_dir: PathBuf,

    // =========================================================================
    // WebP Configuration
    // =========================================================================
    /// Lossy WebP quality for JPEG sources (1-100).
    #[arg(long, default_value_t = DEFAULT_WEBP_QUALITY, env = "WEBP_QUALITY")]
    pub webp_quality: u8,

    /// HTTP Cache-Control max-age in seconds for WebP responses.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "WEBP_MAX_AGE")]
    pub webp_max_age: u32,

    /// Add `cache`, `cache-content-length-orig` and `cache-compression` headers.
    #[arg(long, default_value_t = false, env = "WEBP_HEADER_CACHE_INFO")]
    pub header_cache_info: bool,

    /// Let only one request transcode a given image at a time.
    ///
    /// When disabled, concurrent misses all transcode and the last one wins.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "WEBP_DEDUPE_TRANSCODES"
    )]
    pub dedupe_transcodes: bool,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "WEBP_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Log level: trace, debug, info, warn or error.
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "WEBP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.image_src_dir.as_os_str().is_empty() {
            return Err(
                "Source directory is required. Set --image-src-dir or WEBP_IMAGE_SRC_DIR"
                    .to_string(),
            );
        }
        if self.image_dst_dir.as_os_str().is_empty() {
            return Err(
                "Artifact directory is required. Set --image-dst-dir or WEBP_IMAGE_DST_DIR"
                    .to_string(),
            );
        }

        if !is_valid_quality(self.webp_quality) {
            return Err("webp_quality must be between 1 and 100".to_string());
        }

        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "Unknown log level {:?}, expected one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Log level to use, taking `--verbose` into account.
    pub fn effective_log_level(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.to_ascii_lowercase()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
