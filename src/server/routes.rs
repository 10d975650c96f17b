//! HTTP routes of the image server.
//!
//! ```text
//! GET /health
//! GET /iiif/{identifier}/info.json
//! GET /iiif/{identifier}/{region}/{size}/{rotation}/{quality_format}
//! GET /resolver?rft_id=..[&svc_id=..|&svc.*=..]
//! ```
//!
//! Every route sits behind a CORS layer so browser viewers on other origins
//! can fetch tiles; `X-Cache-Hit` is exposed to them. Request tracing is
//! optional.
//!
//! # Example
//!
//! ```ignore
//! use jp2_streamer::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://viewer.example.org".into()])
//!     .with_tile_size(512);
//! let router = create_router(service, config);
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderName, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, iiif_image_handler, iiif_info_handler, resolver_handler, AppState,
    CACHE_HIT_HEADER,
};
use crate::plan::DEFAULT_TILE_SIZE;
use crate::source::ImageSource;
use crate::tile::DerivativeService;

/// How long browsers may reuse a preflight answer.
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Default Cache-Control max-age for derivatives and info documents.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Router Configuration
// =============================================================================

/// Settings applied when building the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origins allowed to read responses; `None` allows every origin and an
    /// empty list allows none
    pub cors_origins: Option<Vec<String>>,

    /// `Cache-Control: public, max-age=..` on derivatives
    pub cache_max_age: u32,

    /// Tile edge advertised in info.json
    pub tile_size: u32,

    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Any origin, one hour max-age, 256 pixel tiles, tracing on.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            tile_size: DEFAULT_TILE_SIZE,
            enable_tracing: true,
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Build the application router around a derivative service.
pub fn create_router<S>(service: DerivativeService<S>, config: RouterConfig) -> Router
where
    S: ImageSource + 'static,
{
    let state = AppState::new(service, config.cache_max_age, config.tile_size);

    // info.json has two segments after /iiif and derivatives have five, so the
    // routes cannot shadow each other
    let iiif = Router::new()
        .route("/{identifier}/info.json", get(iiif_info_handler::<S>))
        .route(
            "/{identifier}/{region}/{size}/{rotation}/{quality_format}",
            get(iiif_image_handler::<S>),
        );

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/resolver", get(resolver_handler::<S>))
        .nest("/iiif", iiif)
        .with_state(state)
        .layer(cors_layer(config.cors_origins.as_deref()));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// CORS for read-only image routes.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        None => AllowOrigin::any(),
        Some(origins) => AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok())),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(CACHE_HIT_HEADER)])
        .max_age(PREFLIGHT_MAX_AGE)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FsImageSource, ImageRegistry};
    use crate::tile::OpenJpegBackend;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(config: RouterConfig) -> (tempfile::TempDir, Router) {
        let dir = tempfile::TempDir::new().unwrap();
        let service = DerivativeService::new(
            ImageRegistry::new(FsImageSource::new(dir.path())),
            Arc::new(OpenJpegBackend::new()),
            dir.path().join("cache"),
        );
        let router = create_router(service, config.with_tracing(false));
        (dir, router)
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/iiif/sample/full/full/0/native.jpg")
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_router_config_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.cors_origins, None);
        assert_eq!(config.cache_max_age, DEFAULT_CACHE_MAX_AGE);
        assert_eq!(config.tile_size, DEFAULT_TILE_SIZE);
        assert!(config.enable_tracing);
    }

    #[test]
    fn test_router_config_builder() {
        let config = RouterConfig::new()
            .with_cors_origins(vec!["https://viewer.example.org".to_string()])
            .with_cache_max_age(60)
            .with_tile_size(1024)
            .with_tracing(false);

        assert_eq!(config.cors_origins.as_ref().map(Vec::len), Some(1));
        assert_eq!(config.cache_max_age, 60);
        assert_eq!(config.tile_size, 1024);
        assert!(!config.enable_tracing);
    }

    #[tokio::test]
    async fn test_preflight_any_origin() {
        let (_dir, router) = router(RouterConfig::new());

        let response = router.oneshot(preflight("https://a.example")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_preflight_listed_origins_only() {
        let config =
            RouterConfig::new().with_cors_origins(vec!["https://viewer.example.org".to_string()]);
        let (_dir, router) = router(config);

        let allowed = router
            .clone()
            .oneshot(preflight("https://viewer.example.org"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "https://viewer.example.org"
        );

        let denied = router.oneshot(preflight("https://other.example")).await.unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_header_exposed() {
        let (_dir, router) = router(RouterConfig::new());

        let request = Request::builder()
            .uri("/health")
            .header("origin", "https://a.example")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let exposed = response
            .headers()
            .get("access-control-expose-headers")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(exposed.contains(CACHE_HIT_HEADER));
    }

    #[tokio::test]
    async fn test_unknown_identifier_routes_to_handler() {
        let (_dir, router) = router(RouterConfig::new());

        let request = Request::builder()
            .uri("/iiif/absent/info.json")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
