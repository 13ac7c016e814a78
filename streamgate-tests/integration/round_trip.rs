//! Ingest, download and stream flows across components

use axum::http::StatusCode;
use streamgate_core::{BackendLocator, FileEvent, FileId, MetadataStore};
use streamgate_sim::seed_directory;

use super::common::{TestGateway, pattern};

#[tokio::test]
async fn test_download_reingest_stream_round_trip() {
    let gateway = TestGateway::new();
    let original = pattern(12_345);
    gateway.add_file("first", "report.pdf", &original).await;

    let downloaded = gateway.get("/api/download/first", None).await;
    assert_eq!(downloaded.status, StatusCode::OK);

    // Store the downloaded bytes as a new object under a new id
    gateway.backend.insert("loc-second", downloaded.body.clone());
    let receipt = gateway
        .ingestor
        .ingest(FileEvent {
            id: FileId::from("second"),
            file_name: "report copy.pdf".to_string(),
            size_bytes: downloaded.body.len() as u64,
            locator: BackendLocator::from("loc-second"),
        })
        .await
        .unwrap();
    assert_eq!(receipt.download_url, "http://streamgate.test/api/download/second");

    let streamed = gateway.get("/api/stream/second", None).await;
    assert_eq!(streamed.status, StatusCode::OK);
    assert_eq!(streamed.body, original);

    let tail = gateway.get("/api/stream/second", Some("bytes=12000-")).await;
    assert_eq!(tail.body, &original[12000..]);
}

#[tokio::test]
async fn test_reingest_same_file_is_idempotent() {
    let gateway = TestGateway::new();
    let data = pattern(500);
    let first = gateway.add_file("dup", "dup.mp3", &data).await;
    let second = gateway.add_file("dup", "dup.mp3", &data).await;

    assert_eq!(first, second);
    assert_eq!(gateway.store.len().await, 1);
    let reply = gateway.get("/api/stream/dup", None).await;
    assert_eq!(reply.body, data);
}

#[tokio::test]
async fn test_seeded_directory_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let video = pattern(30_000);
    std::fs::write(dir.path().join("holiday.mp4"), &video).unwrap();
    std::fs::write(dir.path().join("theme.mp3"), pattern(2_000)).unwrap();

    let gateway = TestGateway::new();
    let receipts = seed_directory(dir.path(), &gateway.ingestor, &gateway.backend)
        .await
        .unwrap();
    assert_eq!(receipts.len(), 2);

    let receipt = receipts
        .iter()
        .find(|r| r.display_name == "holiday.mp4")
        .unwrap();
    let path = receipt
        .view_url
        .strip_prefix("http://streamgate.test")
        .unwrap();

    let page = gateway.get(path, None).await;
    assert_eq!(page.status, StatusCode::OK);
    let html = String::from_utf8(page.body).unwrap();
    assert!(html.contains("<video"));

    let stream_uri = format!("/api/stream/{}", receipt.id);
    let reply = gateway.get(&stream_uri, Some("bytes=29000-")).await;
    assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(reply.body, &video[29000..]);
}

#[tokio::test]
async fn test_health_reports_store_and_fetches() {
    let gateway = TestGateway::new();
    gateway.add_file("a", "a.bin", &pattern(10)).await;
    gateway.add_file("b", "b.bin", &pattern(10)).await;

    let reply = gateway.get("/api/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let report: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(report["files"], 2);
    assert_eq!(report["active_fetches"], 0);
    assert_eq!(report["store"], "in_memory");
    assert_eq!(report["chunk_size"], 1024);
}
