//! Tile cache integration tests.
//!
//! These verify that rendered derivatives are reused across requests and
//! syntaxes, and that eviction removes artifacts from disk.

use axum::http::StatusCode;

use super::test_utils::{body_bytes, TestServer};

fn cache_hit(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get("x-cache-hit")
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_second_request_is_cache_hit() {
    let server = TestServer::new();
    let uri = "/iiif/sample/full/!200,200/0/native.jpg";

    let first = server.get(uri).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_hit(&first), "false");
    let first_body = body_bytes(first).await;

    let second = server.get(uri).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(cache_hit(&second), "true");
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(server.codec.render_count(), 1);
    assert_eq!(server.artifact_count(), 1);
}

#[tokio::test]
async fn test_legacy_and_iiif_share_cache_entries() {
    let server = TestServer::new();

    let legacy = server.get("/resolver?rft_id=sample&svc.scale=256,0").await;
    assert_eq!(legacy.status(), StatusCode::OK);
    assert_eq!(cache_hit(&legacy), "false");

    let iiif = server.get("/iiif/sample/full/256,/0/native.jpg").await;
    assert_eq!(iiif.status(), StatusCode::OK);
    assert_eq!(cache_hit(&iiif), "true");

    assert_eq!(server.codec.render_count(), 1);
}

#[tokio::test]
async fn test_output_formats_cached_separately() {
    let server = TestServer::new();

    server.get("/iiif/sample/full/!100,100/0/native.jpg").await;
    let png = server.get("/iiif/sample/full/!100,100/0/native.png").await;
    assert_eq!(cache_hit(&png), "false");

    assert_eq!(server.codec.render_count(), 2);
    assert_eq!(server.artifact_count(), 2);
}

#[tokio::test]
async fn test_qualities_cached_separately() {
    let server = TestServer::new();

    server.get("/iiif/sample/full/!100,100/0/native.jpg").await;
    let grey = server.get("/iiif/sample/full/!100,100/0/grey.jpg").await;
    assert_eq!(cache_hit(&grey), "false");
    assert_eq!(server.codec.render_count(), 2);
}

#[tokio::test]
async fn test_eviction_deletes_artifacts() {
    let server = TestServer::with_capacity(1);

    server.get("/iiif/sample/full/!100,100/0/native.jpg").await;
    assert_eq!(server.artifact_count(), 1);

    server.get("/iiif/sample/full/!200,200/0/native.jpg").await;
    assert_eq!(server.artifact_count(), 1);

    // The first derivative was evicted and must be rendered again
    let again = server.get("/iiif/sample/full/!100,100/0/native.jpg").await;
    assert_eq!(cache_hit(&again), "false");
    assert_eq!(server.codec.render_count(), 3);
    assert_eq!(server.artifact_count(), 1);
}

#[tokio::test]
async fn test_removed_artifact_is_rerendered() {
    let server = TestServer::new();
    let uri = "/iiif/sample/full/!100,100/0/native.jpg";

    server.get(uri).await;
    for entry in std::fs::read_dir(server.cache.path()).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let response = server.get(uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_hit(&response), "false");
    assert_eq!(server.codec.render_count(), 2);
    assert_eq!(server.artifact_count(), 1);
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let server = TestServer::new();

    let response = server.get("/iiif/sample/900,0,10,10/full/0/native.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("x-cache-hit").is_none());
    assert_eq!(server.artifact_count(), 0);
}
