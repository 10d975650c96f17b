//! JPEG 2000 metadata and pyramid planning tests on files.

use axum::http::StatusCode;
use tempfile::TempDir;

use jp2_streamer::error::FormatError;
use jp2_streamer::format::{extract_from_path, SourceFormat};
use jp2_streamer::plan::{plan, TileRegion};

use super::test_utils::{
    body_bytes, body_json, create_codestream, create_jp2, create_jp2_with, decode_image,
    TestServer,
};

fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    path
}

// =============================================================================
// Metadata Extraction
// =============================================================================

#[test]
fn test_extract_jp2_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sample.jp2", &create_jp2(800, 600, 5));

    let descriptor = extract_from_path(&path).unwrap();
    assert_eq!(descriptor.width, 800);
    assert_eq!(descriptor.height, 600);
    assert_eq!(descriptor.resolution_levels, 5);
    assert_eq!(descriptor.derivable_levels, 3);
    assert_eq!(descriptor.levels(), 3);
    assert_eq!(descriptor.quality_layers, 1);
    assert_eq!(descriptor.channel_count, 3);
    assert_eq!(descriptor.bit_depth, 8);
    assert_eq!(descriptor.compositing_layer_count, 0);
    assert_eq!(descriptor.source_format, SourceFormat::Jp2);
    assert!(descriptor.embedded_xml_documents.is_empty());
}

#[test]
fn test_extract_bare_codestream_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "raw.j2k", &create_codestream(640, 480, 4, 2));

    let descriptor = extract_from_path(&path).unwrap();
    assert_eq!((descriptor.width, descriptor.height), (640, 480));
    assert_eq!(descriptor.resolution_levels, 4);
    assert_eq!(descriptor.derivable_levels, 2);
    assert_eq!(descriptor.quality_layers, 2);
    assert_eq!(descriptor.channel_count, 3);
    assert_eq!(descriptor.source_format, SourceFormat::J2kCodestream);
}

#[test]
fn test_extract_xml_boxes_in_order() {
    let dir = TempDir::new().unwrap();
    let data = create_jp2_with(1200, 900, 5, &["<a>first</a>", "<b>second</b>"], &[]);
    let path = write_file(&dir, "described.jp2", &data);

    let descriptor = extract_from_path(&path).unwrap();
    assert_eq!(
        descriptor.embedded_xml_documents,
        vec!["<a>first</a>".to_string(), "<b>second</b>".to_string()]
    );
}

#[test]
fn test_extract_counts_compositing_layers() {
    let dir = TempDir::new().unwrap();
    let trailing = b"\x00\x00\x00\x08jplh\x00\x00\x00\x08jplh";
    let path = write_file(&dir, "layers.jpx", &create_jp2_with(800, 600, 5, &[], trailing));

    let descriptor = extract_from_path(&path).unwrap();
    assert_eq!(descriptor.compositing_layer_count, 3);
}

#[test]
fn test_extract_rejects_other_formats() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "photo.jp2", b"\xFF\xD8\xFF\xE0 JFIF data");

    let result = extract_from_path(&path);
    assert!(matches!(result, Err(FormatError::NotJp2 { .. })));
}

#[test]
fn test_extract_truncated_file() {
    let dir = TempDir::new().unwrap();
    let data = create_jp2(800, 600, 5);
    let path = write_file(&dir, "cut.jp2", &data[..data.len() - 6]);

    assert!(extract_from_path(&path).is_err());
}

#[test]
fn test_extract_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = extract_from_path(&dir.path().join("absent.jp2"));
    assert!(matches!(result, Err(FormatError::Io(_))));
}

// =============================================================================
// Pyramid Planning
// =============================================================================

#[test]
fn test_pyramid_for_extracted_image() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sample.jp2", &create_jp2(800, 600, 5));
    let descriptor = extract_from_path(&path).unwrap();

    let tiles = plan(descriptor.width, descriptor.height, 256);
    assert_eq!(descriptor.max_level(), 10);

    let single: Vec<_> = tiles.iter().filter(|t| t.region == TileRegion::All).collect();
    assert_eq!(single.len(), 9);

    let level9 = tiles.iter().filter(|t| t.level == 9).count();
    let level10 = tiles.iter().filter(|t| t.level == 10).count();
    assert_eq!(level9, 4);
    assert_eq!(level10, 12);
    assert_eq!(tiles.len(), 25);

    let last = tiles.last().unwrap();
    assert_eq!(last.region_string(), "512,768,88,32");
    assert_eq!(last.to_query_string(), "svc.region=512,768,88,32&svc.scale=88");
}

#[tokio::test]
async fn test_pyramid_tiles_render_through_resolver() {
    let server = TestServer::new();

    for tile in plan(800, 600, 256).into_iter().filter(|t| t.level == 10) {
        let uri = format!("/resolver?rft_id=sample&{}", tile.to_query_string());
        let response = server.get(&uri).await;
        assert_eq!(response.status(), StatusCode::OK, "tile {}", tile.region);

        let TileRegion::Pixels { h, w, .. } = tile.region else {
            panic!("expected a grid tile");
        };
        let image = decode_image(&body_bytes(response).await);
        assert_eq!((image.width(), image.height()), (w, h));
    }

    assert_eq!(server.codec.render_count(), 12);
}

// =============================================================================
// Served Metadata
// =============================================================================

#[tokio::test]
async fn test_bare_codestream_info() {
    let server = TestServer::new();

    let response = server.get("/iiif/raw/info.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["width"], 640);
    assert_eq!(json["height"], 480);
    assert_eq!(json["tiles"][0]["scaleFactors"], serde_json::json!([1, 2, 4]));
    assert_eq!(json["sizes"][0]["width"], 160);
    assert_eq!(json["sizes"][0]["height"], 120);
}

#[tokio::test]
async fn test_metadata_for_nested_identifier() {
    let server = TestServer::new();

    let response = server
        .get("/resolver?rft_id=maps%2F1850&svc_id=info:lanl-repo/svc/getMetadata")
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["identifier"], "maps/1850");
    assert_eq!(json["width"], 1200);
    assert_eq!(json["levels"], 3);
}
