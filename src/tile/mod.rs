//! Derivative rendering and caching.
//!
//! This module turns resolved plans into encoded images and keeps the results
//! on disk for reuse.
//!
//! # Architecture
//!
//! The derivative service sits between the HTTP layer and the source
//! registry:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           DerivativeService             │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  CodecBackend   │  │
//! │  │ (key → file) │  │ (decode → crop  │  │
//! │  │              │  │  → encode)      │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             ImageRegistry               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`DerivativeService`]: Main entry point, orchestrates the full pipeline
//! - [`TileCache`]: Count-bounded LRU of artifact files, deleting on eviction
//! - [`TileCacheKey`]: Signature of a resolved plan plus output format
//! - [`CodecBackend`]: Seam for the pixel pipeline; [`OpenJpegBackend`] is the default

mod cache;
mod codec;
mod service;

pub use cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use codec::{
    apply_plan, clamp_quality, encode, is_valid_quality, CodecBackend, OpenJpegBackend,
    DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use service::{DerivativeResponse, DerivativeService};
