//! Byte-exact range behavior through the HTTP surface

use axum::http::StatusCode;
use proptest::prelude::*;

use super::common::{TestGateway, pattern};

const SIZE: usize = 10_000;

#[tokio::test]
async fn test_windows_are_byte_exact() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("clip", "clip.mp4", &data).await;

    let cases = [
        ("bytes=0-0", 0, 0),
        ("bytes=0-1023", 0, 1023),
        ("bytes=699-700", 699, 700),
        ("bytes=1500-4321", 1500, 4321),
        ("bytes=9999-9999", 9999, 9999),
        ("bytes=9000-", 9000, 9999),
        ("bytes=5000-999999", 5000, 9999),
    ];

    for (range, start, end) in cases {
        let reply = gateway.get("/api/stream/clip", Some(range)).await;
        assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT, "{range}");
        assert_eq!(
            reply.header("content-range"),
            Some(format!("bytes {start}-{end}/{SIZE}").as_str()),
            "{range}"
        );
        assert_eq!(
            reply.header("content-length"),
            Some((end - start + 1).to_string().as_str()),
            "{range}"
        );
        assert_eq!(reply.body, &data[start..=end], "{range}");
    }
}

#[tokio::test]
async fn test_no_range_serves_whole_file() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("clip", "clip.mp4", &data).await;

    let reply = gateway.get("/api/stream/clip", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("content-length"), Some("10000"));
    assert_eq!(reply.header("accept-ranges"), Some("bytes"));
    assert_eq!(reply.header("content-type"), Some("video/mp4"));
    assert!(reply.header("content-range").is_none());
    assert_eq!(reply.body, data);
}

#[tokio::test]
async fn test_open_ended_from_zero_is_partial() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("clip", "clip.mp4", &data).await;

    let reply = gateway.get("/api/stream/clip", Some("bytes=0-")).await;
    assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(reply.header("content-range"), Some("bytes 0-9999/10000"));
    assert_eq!(reply.body, data);
}

#[tokio::test]
async fn test_start_at_size_is_unsatisfiable() {
    let gateway = TestGateway::new();
    gateway.add_file("clip", "clip.mp4", &pattern(SIZE)).await;

    for range in ["bytes=10000-", "bytes=10000-10005", "bytes=20000-30000"] {
        let reply = gateway.get("/api/stream/clip", Some(range)).await;
        assert_eq!(reply.status, StatusCode::RANGE_NOT_SATISFIABLE, "{range}");
        assert_eq!(reply.header("content-range"), Some("bytes */10000"));
    }
    assert_eq!(gateway.backend.open_calls(), 0);
}

#[tokio::test]
async fn test_malformed_ranges_fall_back_to_full() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("clip", "clip.mp4", &data).await;

    for range in ["bytes=abc-", "bytes=-500", "bytes=0-1,5-9", "bytes=900-100", "pages=1-2"] {
        let reply = gateway.get("/api/stream/clip", Some(range)).await;
        assert_eq!(reply.status, StatusCode::OK, "{range}");
        assert_eq!(reply.body.len(), SIZE, "{range}");
    }
}

#[tokio::test]
async fn test_download_ignores_range() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("clip", "My Clip.mp4", &data).await;

    let reply = gateway.get("/api/download/clip", Some("bytes=0-9")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.header("content-disposition"),
        Some("attachment; filename=\"My Clip.mp4\"")
    );
    assert!(reply.header("content-range").is_none());
    assert_eq!(reply.body, data);
}

#[tokio::test]
async fn test_one_backend_download_per_request() {
    let gateway = TestGateway::new();
    gateway.add_file("clip", "clip.mp4", &pattern(SIZE)).await;

    gateway.get("/api/stream/clip", Some("bytes=8000-9999")).await;
    gateway.get("/api/stream/clip", None).await;
    assert_eq!(gateway.backend.open_calls(), 2);
    assert_eq!(gateway.active_fetches(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_any_window_matches_source(start in 0usize..SIZE, len in 1usize..4000) {
        let end = (start + len - 1).min(SIZE - 1);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let body = runtime.block_on(async {
            let gateway = TestGateway::new();
            gateway.add_file("clip", "clip.bin", &pattern(SIZE)).await;
            let reply = gateway
                .get("/api/stream/clip", Some(&format!("bytes={start}-{end}")))
                .await;
            assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
            reply.body
        });

        prop_assert_eq!(body, pattern(SIZE)[start..=end].to_vec());
    }
}
