//! Backend transfers are released when clients go away

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use streamgate_core::config::GatewayConfig;
use streamgate_sim::{InMemoryBackend, SimulatedFault};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

use super::common::{TestGateway, pattern};

const CYCLES: usize = 25;
const LARGE: usize = 4 * 1024 * 1024;

fn slow_gateway() -> TestGateway {
    TestGateway::with_backend(
        InMemoryBackend::new()
            .with_piece_size(16 * 1024)
            .with_piece_delay(Duration::from_millis(2)),
        GatewayConfig::for_testing().streaming,
    )
}

#[tokio::test]
async fn test_dropped_body_releases_transfer_every_cycle() {
    let gateway = slow_gateway();
    gateway.add_file("big", "big.mp4", &pattern(LARGE)).await;

    for cycle in 0..CYCLES {
        let response = gateway
            .router()
            .oneshot(
                Request::get("/api/stream/big")
                    .header("range", format!("bytes={}-", cycle * 1000))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
        assert_eq!(gateway.active_fetches(), 1);
        assert_eq!(gateway.backend.live_bodies(), 1);

        drop(body);
        assert_eq!(gateway.active_fetches(), 0, "cycle {cycle}");
        assert_eq!(gateway.backend.live_bodies(), 0, "cycle {cycle}");
    }

    assert_eq!(gateway.backend.open_calls(), CYCLES);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_disconnect_releases_transfer() {
    let gateway = slow_gateway();
    gateway.add_file("big", "big.mp4", &pattern(LARGE)).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(streamgate_web::serve(
        listener,
        gateway.state.clone(),
        async move {
            let _ = stop_rx.await;
        },
        Duration::from_secs(5),
    ));

    let client = reqwest::Client::new();
    let url = format!("http://{address}/api/stream/big");

    for cycle in 0..10 {
        let mut response = client
            .get(&url)
            .header("range", "bytes=0-")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PARTIAL_CONTENT);
        assert!(response.chunk().await.unwrap().is_some());
        drop(response);

        assert!(
            gateway.wait_for_release(Duration::from_secs(5)).await,
            "transfer still open after disconnect in cycle {cycle}"
        );
    }

    // A complete response afterwards is unaffected
    let body = client
        .get(format!("http://{address}/api/stream/big"))
        .header("range", "bytes=100-199")
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&body[..], &pattern(LARGE)[100..200]);

    let _ = stop_tx.send(());
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_backend_failure_after_headers_cuts_connection() {
    let gateway = TestGateway::new();
    let data = pattern(200_000);
    gateway.add_file("flaky", "flaky.mp4", &data).await;
    gateway
        .backend
        .set_fault("loc-flaky", SimulatedFault::InterruptAfter(50_000));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(streamgate_web::serve(
        listener,
        gateway.state.clone(),
        async move {
            let _ = stop_rx.await;
        },
        Duration::from_secs(5),
    ));

    let response = reqwest::get(format!("http://{address}/api/stream/flaky"))
        .await
        .unwrap();
    // Headers were already committed as a success
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.content_length(), Some(200_000));

    // The body is cut short rather than padded or completed with an error page
    assert!(response.bytes().await.is_err());
    assert!(gateway.wait_for_release(Duration::from_secs(5)).await);

    let _ = stop_tx.send(());
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_does_not_wait_on_paused_client() {
    let gateway = TestGateway::with_backend(
        InMemoryBackend::new()
            .with_piece_size(1024)
            .with_piece_delay(Duration::from_millis(50)),
        GatewayConfig::for_testing().streaming,
    );
    gateway.add_file("big", "big.mp4", &pattern(LARGE)).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(streamgate_web::serve(
        listener,
        gateway.state.clone(),
        async move {
            let _ = stop_rx.await;
        },
        GatewayConfig::for_testing().server.shutdown_grace,
    ));

    // Read one chunk, then stop reading while holding the connection open
    let mut response = reqwest::Client::new()
        .get(format!("http://{address}/api/stream/big"))
        .header("range", "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PARTIAL_CONTENT);
    assert!(response.chunk().await.unwrap().is_some());

    let _ = stop_tx.send(());
    let stopped = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(stopped.is_ok(), "server kept waiting on a paused client");
    stopped.unwrap().unwrap().unwrap();
    drop(response);
}
