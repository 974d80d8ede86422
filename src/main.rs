//! WebP Cache - serves WebP renditions of images on demand.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webp_cache::{
    cache::{CacheLayout, CacheService},
    config::Config,
    server::{create_router, RouterConfig},
    transcode::WebpTranscoder,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(&config.effective_log_level());

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Source directory: {}", config.image_src_dir.display());
    info!("  Artifact directory: {}", config.image_dst_dir.display());
    info!("  WebP quality: {}", config.webp_quality);
    info!("  WebP max-age: {}s", config.webp_max_age);
    info!("  Request timeout: {}s", config.request_timeout);
    info!(
        "  Deduplicate transcodes: {}",
        if config.dedupe_transcodes { "on" } else { "off" }
    );
    if config.header_cache_info {
        info!("  Diagnostic headers: on");
    }

    if !config.image_src_dir.is_dir() {
        warn!(
            "Source directory {} does not exist, every request will return 404",
            config.image_src_dir.display()
        );
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.image_dst_dir).await {
        error!(
            "Failed to create artifact directory {}: {}",
            config.image_dst_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let layout = CacheLayout::new(&config.image_src_dir, &config.image_dst_dir);
    let cache_service = CacheService::new(layout)
        .with_transcoder(WebpTranscoder::with_quality(config.webp_quality))
        .with_dedupe(config.dedupe_transcodes);

    let router = create_router(cache_service, build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  Try: curl -I http://{}/<image>.jpg.webp", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(level: &str) {
    let env_filter = format!("webp_cache={level},tower_http={level}");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.webp_max_age)
        .with_header_cache_info(config.header_cache_info)
        .with_server_name(config.server_name.clone())
        .with_request_timeout(config.request_timeout())
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Resolve when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
