//! HTTP request handlers for the WebP cache.
//!
//! # Endpoints
//!
//! - `GET <path>.<ext>.webp` - Serve (and produce if needed) a WebP artifact
//! - `GET <path>` - Serve any other file verbatim from the source directory
//! - `GET /health` - Health check endpoint
//! - `GET /metrics` - Request metrics in Prometheus text format

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, warn};

use crate::cache::{resolve, Artifact, CacheService, Resolution};
use crate::error::{CacheError, PathError};

use super::metrics::RequestMetrics;

/// Header carrying `hit` or `miss`.
pub const CACHE_HEADER: &str = "cache";

/// Header carrying the source image size in bytes.
pub const ORIGINAL_LENGTH_HEADER: &str = "cache-content-length-orig";

/// Header carrying artifact size divided by source size.
pub const COMPRESSION_HEADER: &str = "cache-compression";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Service producing and locating artifacts
    pub cache_service: Arc<CacheService>,

    /// Whether to add the `cache*` diagnostic headers to artifact responses
    pub header_cache_info: bool,

    /// Request metrics exposed on `/metrics`
    pub metrics: Arc<RequestMetrics>,
}

impl AppState {
    /// Create a new application state with diagnostics disabled.
    pub fn new(cache_service: CacheService) -> Self {
        Self {
            cache_service: Arc::new(cache_service),
            header_cache_info: false,
            metrics: Arc::new(RequestMetrics::new()),
        }
    }

    /// Enable or disable the diagnostic headers.
    pub fn with_header_cache_info(mut self, enabled: bool) -> Self {
        self.header_cache_info = enabled;
        self
    }

    /// Share an existing metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<RequestMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_path")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build a JSON error response, logging it by severity:
/// 5xx at ERROR, 404 at DEBUG, other 4xx at WARN.
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            CacheError::SourceNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            CacheError::UnsupportedFormat { .. } => (StatusCode::NOT_FOUND, "not_found"),
            CacheError::Decode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "decode_error"),
            CacheError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            CacheError::Commit { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "commit_error"),
            CacheError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            CacheError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        error_response(status, error_type, self.to_string())
    }
}

impl IntoResponse for PathError {
    fn into_response(self) -> Response {
        error_response(StatusCode::BAD_REQUEST, "invalid_path", self.to_string())
    }
}

/// Wrapper for handler errors to implement IntoResponse.
#[derive(Debug)]
pub enum HandlerError {
    Path(PathError),
    Cache(CacheError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Path(err) => err.into_response(),
            HandlerError::Cache(err) => err.into_response(),
        }
    }
}

impl From<PathError> for HandlerError {
    fn from(err: PathError) -> Self {
        HandlerError::Path(err)
    }
}

impl From<CacheError> for HandlerError {
    fn from(err: CacheError) -> Self {
        HandlerError::Cache(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image requests.
///
/// # Endpoint
///
/// `GET /{*path}`
///
/// Paths of the form `<name>.<ext>.webp` are served from the artifact cache,
/// transcoding the source `<name>.<ext>` first when the artifact is missing or
/// older than the source. Everything else is served verbatim from the source
/// directory.
///
/// # Response
///
/// - `200 OK` (or `206`/`304`): the file, with `Content-Type` from its extension
/// - `400 Bad Request`: malformed or traversing path
/// - `404 Not Found`: source missing or format not transcodable
/// - `500 Internal Server Error`: decode, encode or filesystem failure
///
/// # Headers
///
/// With diagnostics enabled, artifact responses also carry `cache: hit|miss`,
/// `cache-content-length-orig` and `cache-compression`.
pub async fn image_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, HandlerError> {
    let resource = match resolve(request.uri().path())? {
        Resolution::Transcode(resource) => resource,
        Resolution::PassThrough => {
            let source_root = &state.cache_service.layout().source_root;
            let response = ServeDir::new(source_root)
                .oneshot(request)
                .await
                .unwrap_or_else(|never| match never {});
            return Ok(response.map(Body::new));
        }
    };

    let artifact = state.cache_service.get_artifact(&resource).await?;

    let mut response = ServeFile::new(&artifact.path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {})
        .map(Body::new);

    if state.header_cache_info {
        apply_cache_info(response.headers_mut(), &artifact);
    }
    response.extensions_mut().insert(artifact.state);

    Ok(response)
}

/// Add the diagnostic headers describing `artifact`.
pub fn apply_cache_info(headers: &mut HeaderMap, artifact: &Artifact) {
    headers.insert(
        CACHE_HEADER,
        HeaderValue::from_static(artifact.state.as_str()),
    );
    headers.insert(
        ORIGINAL_LENGTH_HEADER,
        HeaderValue::from(artifact.source_size),
    );
    if let Some(ratio) = artifact.compression_ratio() {
        if let Ok(value) = HeaderValue::from_str(&format!("{:.2}", ratio)) {
            headers.insert(COMPRESSION_HEADER, value);
        }
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle metrics scrapes.
///
/// `GET /metrics` returns the Prometheus text exposition format.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.render(),
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
