//! Test utilities for integration tests.
//!
//! Provides a temporary source/artifact directory pair plus helpers to create
//! source images and issue requests against a router.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;
use tower::ServiceExt;

use webp_cache::{create_router, CacheLayout, CacheService, RouterConfig};

// =============================================================================
// Fixture
// =============================================================================

/// Temporary source and artifact roots.
pub struct TestDirs {
    src: TempDir,
    dst: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            src: tempfile::tempdir().unwrap(),
            dst: tempfile::tempdir().unwrap(),
        }
    }

    pub fn src(&self) -> &Path {
        self.src.path()
    }

    pub fn dst(&self) -> &Path {
        self.dst.path()
    }

    /// Path of a file under the source root, creating parent directories.
    pub fn src_path(&self, relative: &str) -> PathBuf {
        let path = self.src.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        path
    }

    /// Path under the artifact root.
    pub fn dst_path(&self, relative: &str) -> PathBuf {
        self.dst.path().join(relative)
    }

    /// Write a source file and backdate it so freshly produced artifacts are
    /// strictly newer regardless of filesystem timestamp granularity.
    pub fn write_source(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.src_path(relative);
        fs::write(&path, bytes).unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(60));
        path
    }

    pub fn service(&self) -> CacheService {
        CacheService::new(CacheLayout::new(self.src(), self.dst()))
    }

    /// Router with diagnostics enabled and tracing disabled.
    pub fn router(&self) -> Router {
        self.router_with(RouterConfig::new().with_header_cache_info(true))
    }

    pub fn router_with(&self, config: RouterConfig) -> Router {
        create_router(self.service(), config.with_tracing(false))
    }

    /// Names of leftover temporary files anywhere under the artifact root.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_temp_files(self.dst(), &mut found);
        found
    }
}

fn collect_temp_files(dir: &Path, found: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).unwrap().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            collect_temp_files(&path, found);
        } else if path.to_string_lossy().ends_with(".tmp") {
            found.push(path);
        }
    }
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

// =============================================================================
// Images
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    })
}

/// A small JPEG.
pub fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 95)
        .encode_image(&gradient(width, height))
        .unwrap();
    buf
}

/// A small PNG with an alpha channel.
pub fn create_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8, 200])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A noisy square PNG that takes a noticeable time to transcode.
pub fn create_large_png(side: u32) -> Vec<u8> {
    let mut state = 0x9e37_79b9_u32;
    let img = RgbImage::from_fn(side, side, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A small lossless WebP.
pub fn create_webp(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .encode(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Check for the RIFF/WEBP container signature.
pub fn is_valid_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

// =============================================================================
// Requests
// =============================================================================

/// A collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

pub async fn head(router: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .method(Method::HEAD)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}
