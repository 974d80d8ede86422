//! HTTP server layer for the WebP cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                GET /{*path}.webp   GET /{*path}                 │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌────────────┐  ┌─────────┐  │
//! │  │  handlers   │  │ middleware  │  │   routes   │  │ metrics │  │
//! │  │ (requests)  │  │ (access log)│  │  (router)  │  │ (prom)  │  │
//! │  └─────────────┘  └─────────────┘  └────────────┘  └─────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;

pub use handlers::{
    apply_cache_info, health_handler, image_handler, metrics_handler, AppState, ErrorResponse,
    HandlerError, HealthResponse, CACHE_HEADER, COMPRESSION_HEADER, ORIGINAL_LENGTH_HEADER,
};
pub use metrics::{RequestLabels, RequestMetrics};
pub use middleware::{access_log_middleware, cache_control_value, AccessLog};
pub use routes::{create_router, RouterConfig, DEFAULT_CACHE_MAX_AGE, DEFAULT_REQUEST_TIMEOUT};
