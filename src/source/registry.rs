//! Image registry for descriptor lookup and caching.
//!
//! The registry provides:
//! - LRU caching of parsed descriptors, so each image is parsed once
//! - Singleflight opening, so concurrent requests for a new image parse it once
//! - Blocking JP2 parsing moved off the async runtime
//!
//! # Example
//!
//! ```ignore
//! use jp2_streamer::source::{FsImageSource, ImageRegistry};
//!
//! let registry = ImageRegistry::new(FsImageSource::new("/data/images"));
//!
//! // Parses on first access, cached afterwards
//! let image = registry.get_image("maps/1850").await?;
//! println!("{}x{}", image.descriptor.width, image.descriptor.height);
//! ```

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::debug;

use crate::error::SourceError;
use crate::format::jp2::{extract_from_path, ImageDescriptor};

use super::ImageSource;

/// Default capacity for the descriptor cache (number of images).
pub const DEFAULT_DESCRIPTOR_CACHE_CAPACITY: usize = 100;

// =============================================================================
// SourceImage
// =============================================================================

/// A located and parsed source image.
#[derive(Debug)]
pub struct SourceImage {
    /// Identifier the image was requested by
    pub identifier: String,

    /// Location of the source file
    pub path: PathBuf,

    /// Parsed metadata, shared read-only
    pub descriptor: Arc<ImageDescriptor>,
}

type OpenResult = Result<Arc<SourceImage>, SourceError>;

// =============================================================================
// ImageRegistry
// =============================================================================

/// Registry caching parsed images by identifier.
pub struct ImageRegistry<S: ImageSource> {
    /// Maps identifiers to files
    source: S,

    /// Parsed images indexed by identifier
    cache: RwLock<LruCache<String, Arc<SourceImage>>>,

    /// Opens in progress; every caller for the same identifier shares one cell
    in_flight: Mutex<HashMap<String, Arc<OnceCell<OpenResult>>>>,
}

impl<S: ImageSource> ImageRegistry<S> {
    /// Create a registry with the default cache capacity.
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_DESCRIPTOR_CACHE_CAPACITY)
    }

    /// Create a registry caching at most `capacity` images (minimum 1).
    pub fn with_capacity(source: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            cache: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get an image, locating and parsing it if not already cached.
    pub async fn get_image(&self, identifier: &str) -> OpenResult {
        // Fast path: check cache
        {
            let mut cache = self.cache.write().await;
            if let Some(image) = cache.get(identifier) {
                return Ok(image.clone());
            }
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(identifier.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_init(|| self.open_image(identifier))
            .await
            .clone();

        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight
                .get(identifier)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                in_flight.remove(identifier);
                if let Ok(image) = &result {
                    let mut cache = self.cache.write().await;
                    cache.put(identifier.to_string(), image.clone());
                }
            }
        }

        result
    }

    /// Locate and parse an image without caching.
    async fn open_image(&self, identifier: &str) -> OpenResult {
        let path = self.source.locate(identifier).await?;
        debug!(identifier, path = %path.display(), "parsing image metadata");

        let parse_path = path.clone();
        let descriptor = tokio::task::spawn_blocking(move || extract_from_path(&parse_path))
            .await
            .map_err(|e| SourceError::Io(e.to_string()))??;

        Ok(Arc::new(SourceImage {
            identifier: identifier.to_string(),
            path,
            descriptor: Arc::new(descriptor),
        }))
    }

    /// Drop a cached image so the next request re-parses it.
    pub async fn invalidate(&self, identifier: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(identifier);
    }

    /// Clear all cached images.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Number of cached images.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
