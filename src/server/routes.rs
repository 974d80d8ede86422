//! Router configuration for the WebP cache.
//!
//! This module defines the HTTP routes and applies middleware for access
//! logging, CORS, timeouts and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health          - Health check
//! /metrics         - Prometheus metrics
//! /{*path}.webp    - WebP artifact (transcoded on demand)
//! /{*path}         - Source file pass-through
//! ```
//!
//! # Example
//!
//! ```ignore
//! use webp_cache::cache::{CacheLayout, CacheService};
//! use webp_cache::server::{create_router, RouterConfig};
//!
//! let service = CacheService::new(CacheLayout::new("/srv/images", "/var/cache/webp"));
//! let router = create_router(service, RouterConfig::new().with_header_cache_info(true));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::{CONTENT_TYPE, IF_MODIFIED_SINCE, RANGE};
use http::{Method, StatusCode};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, image_handler, metrics_handler, AppState};
use super::metrics::RequestMetrics;
use super::middleware::{access_log_middleware, AccessLog};
use crate::cache::CacheService;

/// Default `Cache-Control` max-age for WebP responses (one day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86400;

/// Default whole-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for WebP responses
    pub cache_max_age: u32,

    /// Whether to add the `cache*` diagnostic headers
    pub header_cache_info: bool,

    /// Value of the `Server` response header
    pub server_name: String,

    /// Whole-request deadline
    pub request_timeout: Duration,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 day
    /// - Diagnostic headers are off
    /// - Requests time out after 5 seconds
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            header_cache_info: false,
            server_name: env!("CARGO_PKG_NAME").to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable the diagnostic headers.
    pub fn with_header_cache_info(mut self, enabled: bool) -> Self {
        self.header_cache_info = enabled;
        self
    }

    /// Set the `Server` header value.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Set the whole-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Health and metrics routes
/// - The catch-all image route
/// - Access logging, CORS and a request timeout
/// - Request tracing (optional)
pub fn create_router(cache_service: CacheService, config: RouterConfig) -> Router {
    let metrics = Arc::new(RequestMetrics::new());

    let app_state = AppState::new(cache_service)
        .with_header_cache_info(config.header_cache_info)
        .with_metrics(Arc::clone(&metrics));

    let access_log = AccessLog::new(&config.server_name, config.cache_max_age, metrics);

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/", get(image_handler))
        .route("/{*path}", get(image_handler))
        .with_state(app_state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            access_log,
            access_log_middleware,
        ));

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, RANGE, IF_MODIFIED_SINCE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
