//! Unknown ids on every read endpoint

use axum::http::StatusCode;

use super::common::{TestGateway, pattern};

#[tokio::test]
async fn test_unknown_id_is_404_everywhere() {
    let gateway = TestGateway::new();
    gateway.add_file("known", "known.mp4", &pattern(100)).await;

    for uri in [
        "/api/stream/unknown",
        "/api/download/unknown",
        "/api/view/unknown",
    ] {
        let reply = gateway.get(uri, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(reply.body, b"File not found", "{uri}");
    }

    let reply = gateway.get("/api/stream/unknown", Some("bytes=0-10")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(gateway.backend.open_calls(), 0);
}

#[tokio::test]
async fn test_deleted_backend_object_is_500_before_headers() {
    let gateway = TestGateway::new();
    gateway.add_file("gone", "gone.mp4", &pattern(100)).await;
    assert!(gateway.backend.remove("loc-gone"));

    let reply = gateway.get("/api/stream/gone", None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.header("content-range").is_none());
    assert_eq!(gateway.active_fetches(), 0);
}

#[tokio::test]
async fn test_percent_encoded_ids() {
    let gateway = TestGateway::new();
    let data = pattern(64);
    let receipt = gateway.add_file("a b+c", "odd.bin", &data).await;
    assert_eq!(receipt.view_url, "http://streamgate.test/api/view/a%20b%2Bc");

    let reply = gateway.get("/api/stream/a%20b%2Bc", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, data);
}
