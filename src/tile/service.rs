//! Derivative service orchestrating the request pipeline.
//!
//! The DerivativeService is the main entry point for image requests. It
//! orchestrates:
//! - Source lookup via the registry
//! - Plan resolution
//! - Cache lookups
//! - Rendering through the codec backend
//! - Artifact writing and caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      DerivativeService                          │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                  get_derivative()                       │    │
//! │  │  1. Get image         4. Render on blocking thread      │    │
//! │  │  2. Resolve plan      5. Write artifact                 │    │
//! │  │  3. Check cache       6. Cache & return                 │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌───────────┐      ┌──────────────┐    ┌──────────────────┐  │
//! │    │ TileCache │      │ImageRegistry │    │  CodecBackend    │  │
//! │    └───────────┘      └──────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{CodecError, ServiceError};
use crate::plan::{resolve, ExtractionPlan};
use crate::request::{DecodeRequest, OutputFormat};
use crate::source::{ImageRegistry, ImageSource, SourceImage};

use super::cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
use super::codec::CodecBackend;

// =============================================================================
// Derivative Response
// =============================================================================

/// Response from the derivative service.
#[derive(Debug, Clone)]
pub struct DerivativeResponse {
    /// The encoded derivative
    pub data: Bytes,

    /// Output type the data is encoded as
    pub format: OutputFormat,

    /// Whether the derivative was served from the cache
    pub cache_hit: bool,
}

// =============================================================================
// Derivative Service
// =============================================================================

/// Service for rendering and caching derivatives.
///
/// # Type Parameters
///
/// * `S` - The image source type (e.g. [`crate::source::FsImageSource`])
///
/// # Example
///
/// ```ignore
/// use jp2_streamer::source::{FsImageSource, ImageRegistry};
/// use jp2_streamer::tile::{DerivativeService, OpenJpegBackend};
///
/// let registry = ImageRegistry::new(FsImageSource::new("/data/images"));
/// let service = DerivativeService::new(
///     registry,
///     Arc::new(OpenJpegBackend::new()),
///     "/var/cache/jp2",
/// );
///
/// let request = parse_path("maps%2F1850/full/512,/0/default.jpg", None)?.to_decode_request();
/// let response = service.get_derivative("maps/1850", &request).await?;
/// ```
pub struct DerivativeService<S: ImageSource> {
    /// Registry of parsed source images
    registry: Arc<ImageRegistry<S>>,

    /// Map from derivative signatures to artifact files
    cache: TileCache,

    /// Directory holding artifact files
    cache_dir: PathBuf,

    /// Pixel pipeline
    codec: Arc<dyn CodecBackend>,
}

impl<S: ImageSource + 'static> DerivativeService<S> {
    /// Create a service with the default cache capacity.
    pub fn new(
        registry: ImageRegistry<S>,
        codec: Arc<dyn CodecBackend>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::with_shared_registry(
            Arc::new(registry),
            codec,
            cache_dir,
            DEFAULT_TILE_CACHE_CAPACITY,
        )
    }

    /// Create a service around a shared registry.
    pub fn with_shared_registry(
        registry: Arc<ImageRegistry<S>>,
        codec: Arc<dyn CodecBackend>,
        cache_dir: impl Into<PathBuf>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            registry,
            cache: TileCache::new(cache_capacity),
            cache_dir: cache_dir.into(),
            codec,
        }
    }

    /// Look up a source image and its descriptor.
    pub async fn image(&self, identifier: &str) -> Result<Arc<SourceImage>, ServiceError> {
        Ok(self.registry.get_image(identifier).await?)
    }

    /// Resolve a request against an image without rendering it.
    pub async fn plan(
        &self,
        identifier: &str,
        request: &DecodeRequest,
    ) -> Result<(Arc<SourceImage>, ExtractionPlan), ServiceError> {
        let image = self.image(identifier).await?;
        let plan = resolve(&image.descriptor, request)?;
        Ok((image, plan))
    }

    /// Get a derivative, using the cache when available.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The image cannot be found or parsed
    /// - The region lies outside the image
    /// - The backend cannot produce the requested format
    /// - Rendering or writing the artifact fails
    pub async fn get_derivative(
        &self,
        identifier: &str,
        request: &DecodeRequest,
    ) -> Result<DerivativeResponse, ServiceError> {
        let (image, plan) = self.plan(identifier, request).await?;
        let format = request.format.unwrap_or_default();

        if !self.codec.supports(format) {
            return Err(CodecError::UnsupportedOutput(format.mime_type()).into());
        }

        let key = TileCacheKey::new(identifier, &plan, format);

        if let Some(path) = self.cache.get(key.signature()).await {
            match tokio::fs::read(&path).await {
                Ok(data) => {
                    return Ok(DerivativeResponse {
                        data: Bytes::from(data),
                        format,
                        cache_hit: true,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cached artifact unreadable, re-rendering");
                    self.cache.remove(key.signature()).await;
                }
            }
        }

        let data = self.render(&image, plan, format).await?;
        self.store(&key, &data).await?;

        Ok(DerivativeResponse {
            data,
            format,
            cache_hit: false,
        })
    }

    /// Render a derivative without caching.
    pub async fn render(
        &self,
        image: &SourceImage,
        plan: ExtractionPlan,
        format: OutputFormat,
    ) -> Result<Bytes, ServiceError> {
        let codec = self.codec.clone();
        let source = image.path.clone();
        debug!(
            identifier = %image.identifier,
            reduction = plan.reduction_factor,
            width = plan.output_width,
            height = plan.output_height,
            format = %format,
            "rendering derivative"
        );

        let data = tokio::task::spawn_blocking(move || codec.render(&source, &plan, format))
            .await
            .map_err(|e| CodecError::Decode {
                message: format!("render task failed: {}", e),
            })??;
        Ok(data)
    }

    /// Write an artifact and record it in the cache.
    async fn store(&self, key: &TileCacheKey, data: &Bytes) -> Result<(), ServiceError> {
        let path = key.artifact_path(&self.cache_dir);
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| ServiceError::CacheIo(format!("{}: {}", self.cache_dir.display(), e)))?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ServiceError::CacheIo(format!("{}: {}", path.display(), e)))?;

        self.cache.put(key.signature().to_string(), path).await;
        Ok(())
    }

    /// Get cache statistics as `(entry_count, capacity)`.
    pub async fn cache_stats(&self) -> (usize, usize) {
        (self.cache.len().await, self.cache.capacity())
    }

    /// Forget every cached derivative. Artifact files are left on disk.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub fn registry(&self) -> &Arc<ImageRegistry<S>> {
        &self.registry
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn codec(&self) -> &Arc<dyn CodecBackend> {
        &self.codec
    }
}

// =============================================================================
// Tests
// =============================================================================
