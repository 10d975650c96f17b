//! Test utilities for integration tests.
//!
//! This module provides a synthetic JP2 writer, a codec backend that renders
//! blank pixels through the real plan/encode pipeline, and a server fixture
//! with temporary image and cache directories.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use jp2_streamer::error::CodecError;
use jp2_streamer::plan::ExtractionPlan;
use jp2_streamer::request::OutputFormat;
use jp2_streamer::source::{FsImageSource, ImageRegistry};
use jp2_streamer::tile::{apply_plan, encode, CodecBackend, DerivativeService, DEFAULT_JPEG_QUALITY};
use jp2_streamer::{create_router, RouterConfig};

// =============================================================================
// Synthetic JPEG 2000 Files
// =============================================================================

fn push_box(out: &mut Vec<u8>, box_type: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(payload);
}

/// Codestream main header: SOC, SIZ (3 components), COD.
pub fn create_codestream(width: u32, height: u32, levels: u8, layers: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0x4F];

    out.extend_from_slice(&[0xFF, 0x51]);
    out.extend_from_slice(&47u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&3u16.to_be_bytes());
    for _ in 0..3 {
        out.extend_from_slice(&[0x07, 0x01, 0x01]);
    }

    out.extend_from_slice(&[0xFF, 0x52]);
    out.extend_from_slice(&12u16.to_be_bytes());
    out.extend_from_slice(&[0x00, 0x00]);
    out.extend_from_slice(&layers.to_be_bytes());
    out.extend_from_slice(&[0x01, levels, 0x04, 0x04, 0x00, 0x01]);
    out
}

/// A JP2 file with the given geometry, optional XML boxes and bytes after the
/// codestream header.
pub fn create_jp2_with(
    width: u32,
    height: u32,
    levels: u8,
    xml: &[&str],
    trailing: &[u8],
) -> Vec<u8> {
    let mut out = vec![
        0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A,
    ];
    push_box(&mut out, b"ftyp", b"jp2 \x00\x00\x00\x00jp2 ");

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&3u16.to_be_bytes());
    ihdr.extend_from_slice(&[7, 7, 0, 0]);

    let mut header = Vec::new();
    push_box(&mut header, b"ihdr", &ihdr);
    push_box(&mut header, b"colr", &[1, 0, 0, 0, 0, 0, 16]);
    push_box(&mut out, b"jp2h", &header);

    for doc in xml {
        push_box(&mut out, b"xml ", doc.as_bytes());
    }

    let mut stream = create_codestream(width, height, levels, 1);
    stream.extend_from_slice(trailing);
    push_box(&mut out, b"jp2c", &stream);
    out
}

pub fn create_jp2(width: u32, height: u32, levels: u8) -> Vec<u8> {
    create_jp2_with(width, height, levels, &[], &[])
}

// =============================================================================
// Rendering Mock Codec
// =============================================================================

/// Backend that skips wavelet decoding: it starts from a gradient of the
/// reduced size and runs the real crop/resize/rotate/encode steps.
#[derive(Default)]
pub struct RenderingCodec {
    renders: AtomicUsize,
}

impl RenderingCodec {
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl CodecBackend for RenderingCodec {
    fn render(
        &self,
        _source: &Path,
        plan: &ExtractionPlan,
        format: OutputFormat,
    ) -> Result<Bytes, CodecError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let decoded = DynamicImage::ImageRgb8(RgbImage::from_fn(
            plan.reduced_width,
            plan.reduced_height,
            |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]),
        ));
        encode(&apply_plan(decoded, plan), format, DEFAULT_JPEG_QUALITY)
    }

    fn supports(&self, format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jp2 | OutputFormat::Pdf)
    }
}

// =============================================================================
// Server Fixture
// =============================================================================

/// Router over a temporary image root holding:
/// - `sample.jp2`: 800x600, 5 DWT levels (3 usable)
/// - `maps/1850.jp2`: 1200x900 with an XML box
/// - `raw.j2k`: bare codestream, 640x480
/// - `broken.jp2`: not JPEG 2000
pub struct TestServer {
    pub images: TempDir,
    pub cache: TempDir,
    pub codec: Arc<RenderingCodec>,
    pub router: Router,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(cache_capacity: usize) -> Self {
        let images = TempDir::new().unwrap();
        let root = images.path();
        std::fs::write(root.join("sample.jp2"), create_jp2(800, 600, 5)).unwrap();
        std::fs::create_dir_all(root.join("maps")).unwrap();
        std::fs::write(
            root.join("maps/1850.jp2"),
            create_jp2_with(1200, 900, 5, &["<mods>Survey of 1850</mods>"], &[]),
        )
        .unwrap();
        std::fs::write(root.join("raw.j2k"), create_codestream(640, 480, 4, 2)).unwrap();
        std::fs::write(root.join("broken.jp2"), b"GIF89a not a jpeg 2000 file").unwrap();

        let cache = TempDir::new().unwrap();
        let codec = Arc::new(RenderingCodec::default());
        let registry = ImageRegistry::new(FsImageSource::new(root));
        let service = DerivativeService::with_shared_registry(
            Arc::new(registry),
            codec.clone(),
            cache.path(),
            cache_capacity,
        );
        let router = create_router(
            service,
            RouterConfig::new().with_tracing(false).with_cache_max_age(600),
        );

        Self {
            images,
            cache,
            codec,
            router,
        }
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.get_with_accept(uri, None).await
    }

    pub async fn get_with_accept(&self, uri: &str, accept: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(accept) = accept {
            builder = builder.header("accept", accept);
        }
        let request = builder.body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Number of artifact files in the cache directory.
    pub fn artifact_count(&self) -> usize {
        std::fs::read_dir(self.cache.path()).unwrap().count()
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Decode an encoded derivative.
pub fn decode_image(data: &[u8]) -> DynamicImage {
    image::load_from_memory(data).unwrap()
}

/// Check if data is a valid JPEG (SOI marker and decodable).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() > 2
        && data[0] == 0xFF
        && data[1] == 0xD8
        && image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).is_ok()
}

pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG\r\n\x1a\n")
}
