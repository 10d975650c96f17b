//! HTTP API integration tests.
//!
//! These drive the full router (parsing, plan resolution, rendering, cache)
//! against synthetic JPEG 2000 files on disk.

use axum::http::StatusCode;

use super::test_utils::{body_bytes, body_json, decode_image, is_valid_jpeg, is_valid_png, TestServer};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new();

    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

// =============================================================================
// IIIF Image Requests
// =============================================================================

#[tokio::test]
async fn test_iiif_best_fit_size() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/!200,200/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=600"
    );

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    let image = decode_image(&body);
    assert_eq!((image.width(), image.height()), (200, 150));
}

#[tokio::test]
async fn test_iiif_full_size_is_native() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/full/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (800, 600));
}

#[tokio::test]
async fn test_iiif_pixel_region_with_rotation() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/0,0,400,300/full/90/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (300, 400));
}

#[tokio::test]
async fn test_iiif_percent_region() {
    let server = TestServer::new();

    let response = server
        .get("/iiif/sample/pct:50,50,50,50/full/0/native.jpg")
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (400, 300));
}

#[tokio::test]
async fn test_iiif_width_only_size() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/256,/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (256, 192));
}

#[tokio::test]
async fn test_iiif_unsupported_rotation_served_unrotated() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/!200,200/45/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (200, 150));
}

#[tokio::test]
async fn test_iiif_png_extension() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/!100,100/0/native.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let body = body_bytes(response).await;
    assert!(is_valid_png(&body));
    let image = decode_image(&body);
    assert_eq!((image.width(), image.height()), (100, 75));
}

#[tokio::test]
async fn test_iiif_accept_negotiation() {
    let server = TestServer::new();

    let response = server
        .get_with_accept(
            "/iiif/sample/full/pct:10/0/native",
            Some("image/webp, image/png;q=0.9, image/jpeg;q=0.5"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (80, 60));
}

#[tokio::test]
async fn test_iiif_no_extension_defaults_to_jpeg() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/pct:10/0/native").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
}

#[tokio::test]
async fn test_iiif_grey_quality() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/!200,200/0/grey.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert!(!image.color().has_color());
}

#[tokio::test]
async fn test_iiif_encoded_identifier_with_slash() {
    let server = TestServer::new();

    let response = server.get("/iiif/maps%2F1850/full/!300,300/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (300, 225));
}

#[tokio::test]
async fn test_iiif_bare_codestream() {
    let server = TestServer::new();

    let response = server.get("/iiif/raw/full/pct:50/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (320, 240));
}

// =============================================================================
// IIIF Errors
// =============================================================================

#[tokio::test]
async fn test_iiif_invalid_region() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/0,0,abc,10/full/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_iiif_region_out_of_bounds() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/900,0,10,10/full/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "region_out_of_bounds");
}

#[tokio::test]
async fn test_iiif_unknown_identifier() {
    let server = TestServer::new();

    let response = server.get("/iiif/missing/full/full/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_iiif_default_quality_rejected() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/full/0/default.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_iiif_mirroring_rejected() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/full/!90/native.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_iiif_unknown_extension_rejected() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/full/0/native.bmp").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_iiif_unproduced_output_format() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/full/0/native.pdf").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported_output");
    assert_eq!(server.codec.render_count(), 0);
}

#[tokio::test]
async fn test_iiif_source_not_jpeg2000() {
    let server = TestServer::new();

    let response = server.get("/iiif/broken/full/full/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported_format");
}

#[tokio::test]
async fn test_iiif_path_traversal_rejected() {
    let server = TestServer::new();

    let response = server
        .get("/iiif/..%2F..%2Fetc%2Fpasswd/full/full/0/native.jpg")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_identifier");
}

// =============================================================================
// IIIF Info
// =============================================================================

#[tokio::test]
async fn test_info_json() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/info.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["@context"], "http://iiif.io/api/image/2/context.json");
    assert_eq!(json["@id"], "/iiif/sample");
    assert_eq!(json["protocol"], "http://iiif.io/api/image");
    assert_eq!(json["width"], 800);
    assert_eq!(json["height"], 600);

    assert_eq!(
        json["tiles"][0]["scaleFactors"],
        serde_json::json!([1, 2, 4, 8])
    );
    assert_eq!(json["tiles"][0]["width"], 256);

    let sizes = json["sizes"].as_array().unwrap();
    assert_eq!(sizes.len(), 4);
    assert_eq!(sizes[0]["width"], 100);
    assert_eq!(sizes[0]["height"], 75);
    assert_eq!(sizes[3]["width"], 800);

    let formats = json["profile"][1]["formats"].as_array().unwrap();
    assert!(formats.contains(&serde_json::json!("jpg")));
    assert!(!formats.contains(&serde_json::json!("pdf")));
}

#[tokio::test]
async fn test_info_json_uses_host_header() {
    let server = TestServer::new();

    let request = axum::http::Request::builder()
        .uri("/iiif/maps%2F1850/info.json")
        .header("host", "images.example.org")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(server.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["@id"], "http://images.example.org/iiif/maps%2F1850");
    assert_eq!(json["width"], 1200);
}

#[tokio::test]
async fn test_info_json_unknown_identifier() {
    let server = TestServer::new();

    let response = server.get("/iiif/missing/info.json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Legacy Resolver
// =============================================================================

#[tokio::test]
async fn test_resolver_metadata() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=sample&svc_id=info:lanl-repo/svc/getMetadata")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );

    let json = body_json(response).await;
    assert_eq!(json["identifier"], "sample");
    assert_eq!(json["width"], 800);
    assert_eq!(json["height"], 600);
    assert_eq!(json["dwtLevels"], 5);
    assert_eq!(json["levels"], 3);
    assert_eq!(json["compositingLayerCount"], 0);
    assert!(json["imagefile"].as_str().unwrap().ends_with("sample.jp2"));
}

#[tokio::test]
async fn test_resolver_region() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=sample&svc.region=0,0,300,400")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (400, 300));
}

#[tokio::test]
async fn test_resolver_level() {
    let server = TestServer::new();

    let response = server.get("/resolver?rft_id=sample&svc.level=1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (200, 150));
}

#[tokio::test]
async fn test_resolver_scale_factor_and_format() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=sample&svc.scale=0.5&svc.format=image/png&svc.rotate=180")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let image = decode_image(&body_bytes(response).await);
    assert_eq!((image.width(), image.height()), (400, 300));
}

#[tokio::test]
async fn test_resolver_missing_rft_id() {
    let server = TestServer::new();

    let response = server.get("/resolver?svc.level=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_resolver_conflicting_size_parameters() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=sample&svc.scale=100&svc.level=1")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resolver_unknown_format() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=sample&svc.format=image/webp")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resolver_unknown_identifier() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=nowhere&svc_id=info:lanl-repo/svc/getMetadata")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_unknown_route() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/full/full").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
