//! HTTP server layer for JP2 Streamer.
//!
//! This module provides the HTTP API for serving JPEG 2000 derivatives.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET /iiif/{id}/{region}/{size}/{rotation}/{quality}.{fmt}     │
//! │   GET /resolver?rft_id=..&svc.region=..                         │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    info     │  │        routes           │  │
//! │  │ (requests)  │  │ (info.json) │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod info;
pub mod routes;

pub use handlers::{
    health_handler, iiif_image_handler, iiif_info_handler, resolver_handler, AppState,
    ErrorResponse, HandlerError, HealthResponse, IiifPathParams, MetadataResponse,
    GET_METADATA_SERVICE,
};
pub use info::{build_info, InfoResponse, InfoSize, InfoTiles};
pub use routes::{create_router, RouterConfig};
