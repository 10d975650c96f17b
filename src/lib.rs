//! # JP2 Streamer
//!
//! An image delivery server for digital-library collections stored as
//! JPEG 2000 masters.
//!
//! Given an image identifier, clients request a region, size, rotation and
//! quality through the IIIF Image API path syntax or the legacy resolver
//! query syntax; the server answers with an encoded derivative.
//!
//! ## Features
//!
//! - **Metadata without decoding**: JP2 boxes and codestream markers are read
//!   directly to get dimensions, resolution levels and layers
//! - **Resolution reduction**: requests are mapped to the smallest wavelet
//!   level that still covers the target size
//! - **Deep-zoom planning**: every tile of a viewer pyramid can be enumerated
//!   for cache warming
//! - **Disk-backed tile cache**: rendered derivatives are kept as files under
//!   a bounded LRU that deletes evicted artifacts
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`mod@format`] - JP2 box and codestream parsing
//! - [`request`] - Legacy and IIIF request parsers
//! - [`plan`] - Extraction plan resolver and tile pyramid planner
//! - [`source`] - Identifier resolution and descriptor registry
//! - [`tile`] - Codec backend, derivative service and tile cache
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jp2_streamer::{
//!     create_router, DerivativeService, FsImageSource, ImageRegistry, OpenJpegBackend,
//!     RouterConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ImageRegistry::new(FsImageSource::new("/data/images"));
//!     let service = DerivativeService::new(
//!         registry,
//!         Arc::new(OpenJpegBackend::new()),
//!         "/var/cache/jp2",
//!     );
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod plan;
pub mod request;
pub mod server;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, InfoConfig, PyramidConfig, PyramidOutputFormat, ServeConfig};
pub use error::{
    CacheError, CodecError, FormatError, RequestError, ResolveError, ServiceError, SourceError,
};
pub use format::{
    detect_source_format, extract, extract_from_path, parse_descriptor, ImageDescriptor,
    SourceFormat,
};
pub use plan::{plan, resolve, tiles, ExtractionPlan, RegionFraction, TileQuery, TileRegion};
pub use request::{
    parse_legacy, parse_path, DecodeRequest, IiifRequest, LegacyParams, OutputFormat, Quality,
    RegionSpec, Rotation, SizeSpec,
};
pub use server::{create_router, AppState, ErrorResponse, MetadataResponse, RouterConfig};
pub use source::{FsImageSource, ImageRegistry, ImageSource, SourceImage};
pub use tile::{
    CodecBackend, DerivativeResponse, DerivativeService, OpenJpegBackend, TileCache, TileCacheKey,
    DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY,
};
