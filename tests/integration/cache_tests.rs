//! Cache behavior integration tests.
//!
//! Tests verify:
//! - Miss on first request, hit with identical bytes afterwards
//! - Invalidation when the source is modified or removed
//! - Format policies (lossy, lossless, copy, unsupported)
//! - Concurrent first requests
//! - No temporary files are left behind

use std::fs;
use std::time::{Duration, SystemTime};

use axum::http::StatusCode;
use image::GenericImageView;

use webp_cache::RouterConfig;

use super::test_utils::{
    create_jpeg, create_png, create_webp, get, is_valid_webp, set_mtime, TestDirs,
};

// =============================================================================
// Miss / Hit
// =============================================================================

#[tokio::test]
async fn test_first_request_is_miss() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.jpg", &create_jpeg(64, 48));
    let router = dirs.router();

    let response = get(&router, "/photo.jpg.webp").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/webp"));
    assert_eq!(response.header("cache"), Some("miss"));
    assert!(is_valid_webp(&response.body));

    let artifact = dirs.dst_path("photo.jpg.webp");
    assert!(artifact.is_file());
    assert_eq!(fs::read(&artifact).unwrap(), response.body.as_ref());
}

#[tokio::test]
async fn test_second_request_is_hit_with_identical_bytes() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.jpg", &create_jpeg(64, 48));
    let router = dirs.router();

    let first = get(&router, "/photo.jpg.webp").await;
    let second = get(&router, "/photo.jpg.webp").await;

    assert_eq!(first.header("cache"), Some("miss"));
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("cache"), Some("hit"));
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_hit_survives_new_service_instance() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.png", &create_png(10, 10));

    let first = get(&dirs.router(), "/photo.png.webp").await;
    assert_eq!(first.header("cache"), Some("miss"));

    // A fresh router has no in-memory state; the artifact on disk is enough
    let second = get(&dirs.router(), "/photo.png.webp").await;
    assert_eq!(second.header("cache"), Some("hit"));
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_nested_paths_mirror_source_tree() {
    let dirs = TestDirs::new();
    dirs.write_source("albums/2024/summer/beach.jpeg", &create_jpeg(32, 32));
    let router = dirs.router();

    let response = get(&router, "/albums/2024/summer/beach.jpeg.webp").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(dirs
        .dst_path("albums/2024/summer/beach.jpeg.webp")
        .is_file());
}

#[tokio::test]
async fn test_percent_encoded_path() {
    let dirs = TestDirs::new();
    dirs.write_source("my photos/sun set.jpg", &create_jpeg(16, 16));
    let router = dirs.router();

    let response = get(&router, "/my%20photos/sun%20set.jpg.webp").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(dirs.dst_path("my photos/sun set.jpg.webp").is_file());
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_modified_source_invalidates_artifact() {
    let dirs = TestDirs::new();
    let source = dirs.write_source("photo.png", &create_png(8, 8));
    let router = dirs.router();

    let first = get(&router, "/photo.png.webp").await;
    assert_eq!(first.header("cache"), Some("miss"));

    fs::write(&source, create_png(20, 12)).unwrap();
    set_mtime(&source, SystemTime::now() + Duration::from_secs(60));

    let second = get(&router, "/photo.png.webp").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("cache"), Some("miss"));

    let decoded =
        image::load_from_memory_with_format(&second.body, image::ImageFormat::WebP).unwrap();
    assert_eq!(decoded.dimensions(), (20, 12));
}

#[tokio::test]
async fn test_deleted_source_returns_not_found() {
    let dirs = TestDirs::new();
    let source = dirs.write_source("photo.jpg", &create_jpeg(16, 16));
    let router = dirs.router();

    assert_eq!(get(&router, "/photo.jpg.webp").await.status, StatusCode::OK);

    fs::remove_file(&source).unwrap();

    let response = get(&router, "/photo.jpg.webp").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["message"], "File not found: /photo.jpg.webp");

    // Stale artifacts are never deleted
    assert!(dirs.dst_path("photo.jpg.webp").is_file());
}

#[tokio::test]
async fn test_missing_source_creates_nothing() {
    let dirs = TestDirs::new();
    let router = dirs.router();

    let response = get(&router, "/nowhere/photo.jpg.webp").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "not_found");
    assert!(!dirs.dst_path("nowhere").exists());
}

// =============================================================================
// Format Policies
// =============================================================================

#[tokio::test]
async fn test_webp_source_is_copied_verbatim() {
    let dirs = TestDirs::new();
    let original = create_webp(24, 24);
    dirs.write_source("photo.webp", &original);
    let router = dirs.router();

    let response = get(&router, "/photo.webp.webp").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), original.as_slice());
    assert_eq!(
        fs::read(dirs.dst_path("photo.webp.webp")).unwrap(),
        original
    );
}

#[tokio::test]
async fn test_png_is_lossless() {
    let dirs = TestDirs::new();
    let png = create_png(13, 7);
    dirs.write_source("icon.png", &png);
    let router = dirs.router();

    let response = get(&router, "/icon.png.webp").await;
    assert_eq!(response.status, StatusCode::OK);

    let original = image::load_from_memory(&png).unwrap().to_rgba8();
    let decoded = image::load_from_memory_with_format(&response.body, image::ImageFormat::WebP)
        .unwrap()
        .to_rgba8();
    assert_eq!(original.dimensions(), decoded.dimensions());
    assert_eq!(original.as_raw(), decoded.as_raw());
}

#[tokio::test]
async fn test_jpeg_is_lossy() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.jpg", &create_jpeg(64, 64));
    let router = dirs.router();

    let response = get(&router, "/photo.jpg.webp").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[12..16], b"VP8 ");
}

#[tokio::test]
async fn test_unsupported_format_returns_not_found() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.bmp", b"BM not really a bitmap");
    let router = dirs.router();

    let response = get(&router, "/photo.bmp.webp").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!dirs.dst_path("photo.bmp.webp").exists());
    assert!(dirs.temp_files().is_empty());
}

#[tokio::test]
async fn test_empty_webp_source_creates_nothing() {
    let dirs = TestDirs::new();
    dirs.write_source("albums/empty.webp", b"");
    let router = dirs.router();

    let response = get(&router, "/albums/empty.webp.webp").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!dirs.dst_path("albums").exists());
    assert!(dirs.temp_files().is_empty());
}

#[tokio::test]
async fn test_uppercase_extensions() {
    let dirs = TestDirs::new();
    dirs.write_source("PHOTO.JPG", &create_jpeg(16, 16));
    let router = dirs.router();

    let response = get(&router, "/PHOTO.JPG.WEBP").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(dirs.dst_path("PHOTO.JPG.webp").is_file());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_corrupt_source_is_server_error() {
    let dirs = TestDirs::new();
    dirs.write_source("broken.jpg", b"this is not a jpeg at all");
    let router = dirs.router();

    let response = get(&router, "/broken.jpg.webp").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "decode_error");
    assert!(!dirs.dst_path("broken.jpg.webp").exists());
    assert!(dirs.temp_files().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_source_path_is_io_error() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.jpg", &create_jpeg(16, 16));
    let router = dirs.router();

    // Treating a regular file as a directory is not a plain "not found"
    let response = get(&router, "/photo.jpg/x.jpg.webp").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "io_error");
    assert_eq!(response.json()["status"], 500);
    assert!(!dirs.dst_path("photo.jpg").exists());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_artifact() {
    let dirs = TestDirs::new();
    let source = dirs.write_source("photo.jpg", &create_jpeg(16, 16));
    let router = dirs.router();

    let first = get(&router, "/photo.jpg.webp").await;
    assert_eq!(first.status, StatusCode::OK);

    fs::write(&source, b"corrupted").unwrap();
    set_mtime(&source, SystemTime::now() + Duration::from_secs(60));

    let second = get(&router, "/photo.jpg.webp").await;
    assert_eq!(second.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        fs::read(dirs.dst_path("photo.jpg.webp")).unwrap(),
        first.body.as_ref()
    );
    assert!(dirs.temp_files().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.jpg", &create_jpeg(128, 128));
    let router = dirs.router();

    let (a, b) = tokio::join!(
        get(&router, "/photo.jpg.webp"),
        get(&router, "/photo.jpg.webp")
    );

    assert_eq!(a.status, StatusCode::OK);
    assert_eq!(b.status, StatusCode::OK);
    assert!(is_valid_webp(&a.body));
    assert!(is_valid_webp(&b.body));

    let artifact = fs::read(dirs.dst_path("photo.jpg.webp")).unwrap();
    assert!(image::load_from_memory_with_format(&artifact, image::ImageFormat::WebP).is_ok());
    assert!(dirs.temp_files().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_transcode_once() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.png", &create_png(64, 64));
    let router = dirs.router();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { get(&router, "/photo.png.webp").await })
        })
        .collect();

    let mut misses = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        if response.header("cache") == Some("miss") {
            misses += 1;
        }
    }
    assert_eq!(misses, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_without_dedupe() {
    let dirs = TestDirs::new();
    dirs.write_source("photo.png", &create_png(64, 64));
    let service = dirs.service().with_dedupe(false);
    let router = webp_cache::create_router(
        service,
        RouterConfig::new()
            .with_header_cache_info(true)
            .with_tracing(false),
    );

    let (a, b) = tokio::join!(
        get(&router, "/photo.png.webp"),
        get(&router, "/photo.png.webp")
    );

    assert_eq!(a.status, StatusCode::OK);
    assert_eq!(b.status, StatusCode::OK);
    assert_eq!(a.body, b.body);
    assert!(dirs.temp_files().is_empty());
}
