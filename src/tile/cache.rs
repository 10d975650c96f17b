//! On-disk derivative cache.
//!
//! This module maps derivative cache keys to artifact files and owns the
//! lifetime of those files: once a path is inserted, the cache deletes it when
//! the entry is evicted or removed.
//!
//! # Cache Key
//!
//! A derivative is identified by its resolved signature:
//! - Image identifier
//! - Reduction factor
//! - Region fractions (or full image)
//! - Output dimensions
//! - Rotation, quality and compositing layer
//! - Output format
//!
//! Distinct resolved plans always give distinct signatures. Artifact files are
//! named after the SHA-256 of the signature.
//!
//! # Count-Based Eviction
//!
//! The cache holds at most `capacity` entries. Inserting a new key into a full
//! cache pops the least-recently-used entry and deletes its file. Deletion
//! failures are logged; the map change is never rolled back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::plan::ExtractionPlan;
use crate::request::OutputFormat;

/// Default maximum number of cached derivatives.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 1000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for a rendered derivative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Image identifier
    pub identifier: Arc<str>,

    /// Output format
    pub format: OutputFormat,

    /// Full signature string
    signature: String,
}

impl TileCacheKey {
    /// Build the key for `plan` rendered from `identifier` as `format`.
    pub fn new(identifier: impl Into<Arc<str>>, plan: &ExtractionPlan, format: OutputFormat) -> Self {
        let identifier = identifier.into();
        let region = match &plan.region {
            None => "full".to_string(),
            Some(r) => format!("{},{},{},{}", r.top, r.left, r.height, r.width),
        };
        let layer = plan
            .compositing_layer
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());

        let signature = format!(
            "{}|r={}|region={}|size={}x{}|rot={}|q={}|layer={}|fmt={}",
            identifier,
            plan.reduction_factor,
            region,
            plan.output_width,
            plan.output_height,
            plan.rotation.degrees(),
            plan.quality,
            layer,
            format.mime_type(),
        );

        Self {
            identifier,
            format,
            signature,
        }
    }

    /// The signature string used as the map key.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// `<sha256(signature)>.<ext>`
    pub fn file_name(&self) -> String {
        let digest = Sha256::digest(self.signature.as_bytes());
        format!("{}.{}", hex::encode(digest), self.format.extension())
    }

    /// Artifact location under `dir`.
    pub fn artifact_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Bounded LRU map from cache keys to artifact files.
///
/// # Thread Safety
///
/// Every operation runs under a single async mutex, including the file
/// deletion that accompanies eviction, so operations never interleave.
///
/// # Example
///
/// ```no_run
/// use jp2_streamer::tile::TileCache;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = TileCache::new(2);
///
///     cache.put("a".to_string(), PathBuf::from("/tmp/a.jpg")).await;
///     cache.put("b".to_string(), PathBuf::from("/tmp/b.jpg")).await;
///
///     // Evicts "a" and deletes /tmp/a.jpg
///     cache.put("c".to_string(), PathBuf::from("/tmp/c.jpg")).await;
///     assert!(!cache.contains_key("a").await);
/// }
/// ```
pub struct TileCache {
    entries: Mutex<LruCache<String, PathBuf>>,
    capacity: usize,
}

impl TileCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            capacity: capacity.max(1),
        }
    }

    /// Insert `key`, returning the path it previously mapped to.
    ///
    /// The caller must have written the file first. Replacing an existing key
    /// deletes nothing. A new key that pushes the cache over capacity evicts the
    /// least-recently-used entry and deletes its file.
    pub async fn put(&self, key: String, path: PathBuf) -> Option<PathBuf> {
        let mut entries = self.entries.lock().await;

        let previous = entries.put(key, path);

        while entries.len() > self.capacity {
            match entries.pop_lru() {
                Some((evicted_key, evicted_path)) => {
                    debug!(key = %evicted_key, path = %evicted_path.display(), "evicting derivative");
                    delete_artifact(&evicted_path).await;
                }
                None => break,
            }
        }

        previous
    }

    /// Look up `key`, marking it as recently used.
    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        let mut entries = self.entries.lock().await;
        entries.get(key).cloned()
    }

    /// Remove `key` and delete its file.
    pub async fn remove(&self, key: &str) -> Option<PathBuf> {
        let mut entries = self.entries.lock().await;
        let path = entries.pop(key)?;
        delete_artifact(&path).await;
        Some(path)
    }

    /// Check membership without touching recency.
    pub async fn contains_key(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries.contains(key)
    }

    /// Number of resident entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        let entries = self.entries.lock().await;
        entries.is_empty()
    }

    /// Forget every entry. Files are left on disk.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_CACHE_CAPACITY)
    }
}

/// Best-effort delete; failures are logged and swallowed.
async fn delete_artifact(path: &Path) {
    if let Err(source) = tokio::fs::remove_file(path).await {
        let err = CacheError {
            path: path.to_path_buf(),
            source,
        };
        warn!(error = %err, "cache artifact cleanup failed");
    }
}

// =============================================================================
// Tests
// =============================================================================
