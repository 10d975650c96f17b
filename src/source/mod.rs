//! Image source abstraction and descriptor registry.
//!
//! An [`ImageSource`] maps a request identifier to a readable JPEG 2000 file.
//! The [`ImageRegistry`] sits on top of it, parsing each image's metadata
//! once and sharing the result between requests.
//!
//! ```text
//! identifier ──► ImageSource::locate ──► path ──► extract_from_path ──► ImageDescriptor
//!                                                         │
//!                                            ImageRegistry LRU (Arc<SourceImage>)
//! ```

mod fs_source;
mod registry;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SourceError;

pub use fs_source::{FsImageSource, CANDIDATE_EXTENSIONS};
pub use registry::{ImageRegistry, SourceImage, DEFAULT_DESCRIPTOR_CACHE_CAPACITY};

/// Resolves identifiers to source files.
///
/// Implementations must reject identifiers that would escape their storage
/// with [`SourceError::InvalidIdentifier`] and report absent images with
/// [`SourceError::NotFound`].
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn locate(&self, identifier: &str) -> Result<PathBuf, SourceError>;
}
