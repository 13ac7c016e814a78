//! Concurrent requests against one file

use axum::http::StatusCode;
use futures::future::join_all;

use super::common::{TestGateway, pattern};

const SIZE: usize = 64 * 1024;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_disjoint_ranges() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("movie", "movie.mkv", &data).await;

    let slice = SIZE / 8;
    let requests = (0..8).map(|i| {
        let gateway = &gateway;
        async move {
            let start = i * slice;
            let end = start + slice - 1;
            let reply = gateway
                .get("/api/stream/movie", Some(&format!("bytes={start}-{end}")))
                .await;
            (start, end, reply)
        }
    });

    for (start, end, reply) in join_all(requests).await {
        assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(reply.body, &data[start..=end]);
    }

    // No sharing of in-flight downloads: one backend open per request
    assert_eq!(gateway.backend.open_calls(), 8);
    assert_eq!(gateway.active_fetches(), 0);
    assert_eq!(gateway.backend.live_bodies(), 0);
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let gateway = TestGateway::new();
    gateway.add_file("movie", "movie.mkv", &pattern(SIZE)).await;

    let first = gateway.get("/api/stream/movie", Some("bytes=1234-40000")).await;
    let second = gateway.get("/api/stream/movie", Some("bytes=1234-40000")).await;

    assert_eq!(first.status, second.status);
    assert_eq!(first.header("content-range"), second.header("content-range"));
    assert_eq!(first.body, second.body);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_viewers_of_one_file() {
    let gateway = TestGateway::new();
    let data = pattern(SIZE);
    gateway.add_file("movie", "movie.mkv", &data).await;

    let replies = join_all((0..16).map(|_| gateway.get("/api/stream/movie", None))).await;
    for reply in replies {
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, data);
    }
    assert_eq!(gateway.backend.open_calls(), 16);
}
