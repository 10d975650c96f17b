//! HTTP request handlers for the image API.
//!
//! # Endpoints
//!
//! - `GET /iiif/{identifier}/{region}/{size}/{rotation}/{quality}.{format}` - IIIF derivative
//! - `GET /iiif/{identifier}/info.json` - IIIF image information
//! - `GET /resolver?rft_id=..&svc.region=..` - Legacy derivative
//! - `GET /resolver?rft_id=..&svc_id=info:lanl-repo/svc/getMetadata` - Metadata record
//! - `GET /health` - Health check endpoint

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{CodecError, RequestError, ServiceError, SourceError};
use crate::format::ImageDescriptor;
use crate::request::iiif::decode_identifier;
use crate::request::{parse_segments, LegacyParams, OutputFormat};
use crate::source::ImageSource;
use crate::tile::{DerivativeResponse, DerivativeService};

use super::info::{build_info, InfoResponse};

/// `svc_id` value selecting the metadata record.
pub const GET_METADATA_SERVICE: &str = "info:lanl-repo/svc/getMetadata";

/// Query key carrying the identifier on the resolver endpoint.
pub const PARAM_RFT_ID: &str = "rft_id";

/// Query key selecting the resolver service.
pub const PARAM_SVC_ID: &str = "svc_id";

/// Response header reporting whether a derivative came from the cache.
pub const CACHE_HIT_HEADER: &str = "x-cache-hit";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the derivative service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: ImageSource> {
    /// The service rendering derivatives
    pub service: Arc<DerivativeService<S>>,

    /// Cache-Control max-age in seconds for derivatives
    pub cache_max_age: u32,

    /// Tile size advertised in info.json
    pub tile_size: u32,
}

impl<S: ImageSource + 'static> AppState<S> {
    pub fn new(service: DerivativeService<S>, cache_max_age: u32, tile_size: u32) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age,
            tile_size,
        }
    }
}

impl<S: ImageSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache_max_age: self.cache_max_age,
            tile_size: self.tile_size,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for IIIF image requests.
#[derive(Debug, Deserialize)]
pub struct IiifPathParams {
    pub identifier: String,
    pub region: String,
    pub size: String,
    pub rotation: String,

    /// `quality` or `quality.ext`
    pub quality_format: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// Body of every non-image failure, e.g.
/// `{"error":"region_out_of_bounds","message":"...","status":400}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable machine-readable kind
    pub error: String,

    pub message: String,

    /// Mirrors the response status when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Metadata record for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub identifier: String,

    /// Location of the source file
    pub imagefile: String,
    pub width: u32,
    pub height: u32,

    /// DWT levels in the codestream
    pub dwt_levels: u32,

    /// Levels usable for reduction
    pub levels: u32,
    pub compositing_layer_count: u32,
}

impl MetadataResponse {
    pub fn new(identifier: &str, imagefile: &str, descriptor: &ImageDescriptor) -> Self {
        Self {
            identifier: identifier.to_string(),
            imagefile: imagefile.to_string(),
            width: descriptor.width,
            height: descriptor.height,
            dwt_levels: descriptor.resolution_levels,
            levels: descriptor.levels(),
            compositing_layer_count: descriptor.compositing_layer_count,
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Wrapper for handler errors to implement IntoResponse.
#[derive(Debug)]
pub struct HandlerError(pub ServiceError);

impl HandlerError {
    /// Status code and error type identifier for the wrapped error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            ServiceError::Request(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ServiceError::Resolve(_) => (StatusCode::BAD_REQUEST, "region_out_of_bounds"),

            ServiceError::Source(SourceError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ServiceError::Source(SourceError::InvalidIdentifier(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_identifier")
            }
            ServiceError::Source(SourceError::Format(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
            }
            ServiceError::Source(SourceError::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "io_error")
            }

            ServiceError::Codec(CodecError::UnsupportedOutput(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_output")
            }
            ServiceError::Codec(CodecError::Decode { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "decode_error")
            }
            ServiceError::Codec(CodecError::Encode { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "encode_error")
            }

            ServiceError::CacheIo(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
        }
    }
}

/// Unknown identifiers are routine (viewers probe), so 404 logs at debug;
/// other client errors at warn and server errors at error.
impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        let message = self.0.to_string();
        let code = status.as_u16();

        match status {
            s if s.is_server_error() => error!(kind, status = code, "request failed: {}", message),
            StatusCode::NOT_FOUND => debug!(kind, status = code, "no such image: {}", message),
            _ => warn!(kind, status = code, "rejected request: {}", message),
        }

        (status, Json(ErrorResponse::with_status(kind, message, status))).into_response()
    }
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        HandlerError(err)
    }
}

impl From<RequestError> for HandlerError {
    fn from(err: RequestError) -> Self {
        HandlerError(err.into())
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle IIIF image requests.
///
/// # Endpoint
///
/// `GET /iiif/{identifier}/{region}/{size}/{rotation}/{quality}.{format}`
///
/// Without a format extension the output type is negotiated from `Accept`.
///
/// # Response
///
/// - `200 OK`: the derivative, with `Content-Type` of the output type
/// - `400 Bad Request`: malformed request or region outside the image
/// - `404 Not Found`: unknown identifier
/// - `415 Unsupported Media Type`: source not JPEG 2000, or output type not produced
/// - `500 Internal Server Error`: decode, encode or cache failure
///
/// # Headers
///
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache-Hit: true|false`
pub async fn iiif_image_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path(params): Path<IiifPathParams>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());

    let request = parse_segments(
        &params.identifier,
        &params.region,
        &params.size,
        &params.rotation,
        &params.quality_format,
        accept,
    )?;

    let response = state
        .service
        .get_derivative(&request.identifier, &request.to_decode_request())
        .await?;

    Ok(image_response(response, state.cache_max_age))
}

/// Handle IIIF image information requests.
///
/// # Endpoint
///
/// `GET /iiif/{identifier}/info.json`
pub async fn iiif_info_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path(identifier): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InfoResponse>, HandlerError> {
    let identifier = decode_identifier(&identifier)?;
    let image = state.service.image(&identifier).await?;

    let base_uri = match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!(
            "http://{}/iiif/{}",
            host,
            urlencoding::encode(&identifier)
        ),
        None => format!("/iiif/{}", urlencoding::encode(&identifier)),
    };

    let codec = state.service.codec();
    let formats: Vec<OutputFormat> = OutputFormat::SUPPORTED
        .into_iter()
        .filter(|f| codec.supports(*f))
        .collect();

    Ok(Json(build_info(
        &image.descriptor,
        base_uri,
        state.tile_size,
        &formats,
    )))
}

/// Handle legacy resolver requests.
///
/// # Endpoint
///
/// `GET /resolver`
///
/// # Query Parameters
///
/// - `rft_id`: image identifier (required)
/// - `svc_id`: `info:lanl-repo/svc/getMetadata` returns the metadata record
/// - `svc.region`, `svc.scale`, `svc.level`, `svc.reduce`, `svc.rotate`,
///   `svc.format`, `svc.clayer`: derivative parameters
///
/// # Response
///
/// `200 OK` with either the metadata JSON or the derivative image:
/// ```json
/// {
///   "identifier": "maps/1850",
///   "imagefile": "/data/images/maps/1850.jp2",
///   "width": 1684,
///   "height": 2338,
///   "dwtLevels": 6,
///   "levels": 4,
///   "compositingLayerCount": 0
/// }
/// ```
pub async fn resolver_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, HandlerError> {
    let identifier = query
        .get(PARAM_RFT_ID)
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .ok_or(RequestError::Missing(PARAM_RFT_ID))?;

    if query.get(PARAM_SVC_ID).map(String::as_str) == Some(GET_METADATA_SERVICE) {
        let image = state.service.image(identifier).await?;
        let record = MetadataResponse::new(
            identifier,
            &image.path.display().to_string(),
            &image.descriptor,
        );
        return Ok(Json(record).into_response());
    }

    let params = LegacyParams::from_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let request = params.parse()?;

    let response = state.service.get_derivative(identifier, &request).await?;
    Ok(image_response(response, state.cache_max_age))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn image_response(response: DerivativeResponse, cache_max_age: u32) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, response.format.mime_type().to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", cache_max_age),
            ),
            (
                HeaderName::from_static(CACHE_HIT_HEADER),
                response.cache_hit.to_string(),
            ),
        ],
        response.data,
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
