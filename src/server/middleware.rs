//! Access log and response decoration middleware.
//!
//! Every response gets a `Server` header; WebP responses additionally get a
//! `Cache-Control` max-age. Each request is then logged and recorded in
//! [`RequestMetrics`].

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use crate::cache::CacheState;

use super::metrics::{RequestLabels, RequestMetrics};

/// State shared by [`access_log_middleware`].
#[derive(Clone)]
pub struct AccessLog {
    /// Value of the `Server` response header
    pub server_name: HeaderValue,

    /// `Cache-Control` value for WebP responses
    pub cache_control: HeaderValue,

    pub metrics: Arc<RequestMetrics>,
}

impl AccessLog {
    pub fn new(server_name: &str, cache_max_age: u32, metrics: Arc<RequestMetrics>) -> Self {
        Self {
            server_name: HeaderValue::from_str(server_name)
                .unwrap_or_else(|_| HeaderValue::from_static(env!("CARGO_PKG_NAME"))),
            cache_control: cache_control_value(cache_max_age),
            metrics,
        }
    }
}

/// `Cache-Control` value for a max-age in seconds.
pub fn cache_control_value(max_age: u32) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={}", max_age))
        .unwrap_or_else(|_| HeaderValue::from_static("public"))
}

/// Decorate, log and record every response.
pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    if !headers.contains_key(header::SERVER) {
        headers.insert(header::SERVER, log.server_name.clone());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if content_type.contains("image/webp") {
        headers.insert(header::CACHE_CONTROL, log.cache_control.clone());
    }

    let size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let cache = response
        .extensions()
        .get::<CacheState>()
        .map(CacheState::as_str)
        .unwrap_or_default();

    let status = response.status();
    let duration = start.elapsed();

    log.metrics.record(
        RequestLabels::new(status.as_u16(), method.as_str(), cache, &content_type),
        duration,
    );

    if status.is_server_error() {
        warn!(
            code = status.as_u16(),
            proto = ?version,
            method = %method,
            url = %uri,
            time = duration.as_secs_f64(),
            size,
            ua = %user_agent,
            "HTTP response"
        );
    } else {
        info!(
            code = status.as_u16(),
            proto = ?version,
            method = %method,
            url = %uri,
            time = duration.as_secs_f64(),
            size,
            ua = %user_agent,
            "HTTP response"
        );
    }

    response
}

// =============================================================================
// Tests
// =============================================================================
