//! Telegram backend and ingestion against a mock Bot API server

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use parking_lot::Mutex;
use serde_json::{Value, json};
use streamgate_core::config::{DEFAULT_MAX_DOWNLOAD_BYTES, GatewayConfig, TelegramConfig};
use streamgate_core::telegram::{BotApiClient, TelegramBackend, Update, UpdatePoller};
use streamgate_core::{
    BackendLocator, ByteWindow, ChunkedFetcher, FetchError, FileId, InMemoryMetadataStore,
    Ingestor, MetadataStore,
};
use streamgate_web::{AppState, build_router};
use tokio::net::TcpListener;
use tower::ServiceExt;

use super::common::pattern;

const TOKEN: &str = "test-token";
const STORAGE_CHANNEL: i64 = -100_123;
const STORED_FILE_ID: &str = "stored-copy";

#[derive(Default)]
struct MockState {
    files: HashMap<String, Vec<u8>>,
    /// File ids getFile refuses as too big
    oversized: HashSet<String>,
    replies: Vec<(i64, String)>,
    forwarded: Vec<(i64, i64, i64)>,
}

type Shared = Arc<Mutex<MockState>>;

fn ok(result: Value) -> Response {
    Json(json!({ "ok": true, "result": result })).into_response()
}

fn message(message_id: i64, chat_id: i64) -> Value {
    json!({ "message_id": message_id, "chat": { "id": chat_id } })
}

async fn get_file(State(state): State<Shared>, Json(params): Json<Value>) -> Response {
    let file_id = params["file_id"].as_str().unwrap_or_default().to_string();
    let (size, oversized) = {
        let mock = state.lock();
        (
            mock.files.get(&file_id).map(Vec::len),
            mock.oversized.contains(&file_id),
        )
    };
    if oversized {
        return bad_request("Bad Request: file is too big");
    }
    match size {
        Some(size) => ok(json!({
            "file_id": file_id,
            "file_unique_id": format!("u-{file_id}"),
            "file_size": size,
            "file_path": format!("documents/{file_id}"),
        })),
        None => bad_request("Bad Request: invalid file_id"),
    }
}

fn bad_request(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "ok": false,
            "error_code": 400,
            "description": description,
        })),
    )
        .into_response()
}

async fn download(State(state): State<Shared>, Path(file_id): Path<String>) -> Response {
    match state.lock().files.get(&file_id) {
        Some(data) => data.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn forward_message(State(state): State<Shared>, Json(params): Json<Value>) -> Response {
    let to = params["chat_id"].as_i64().unwrap_or_default();
    let from = params["from_chat_id"].as_i64().unwrap_or_default();
    let id = params["message_id"].as_i64().unwrap_or_default();
    state.lock().forwarded.push((to, from, id));

    let mut forwarded = message(9000 + id, to);
    forwarded["document"] = json!({
        "file_id": STORED_FILE_ID,
        "file_unique_id": "u-stored",
        "file_name": "holiday video.mp4",
    });
    ok(forwarded)
}

async fn send_message(State(state): State<Shared>, Json(params): Json<Value>) -> Response {
    let chat_id = params["chat_id"].as_i64().unwrap_or_default();
    let text = params["text"].as_str().unwrap_or_default().to_string();
    let mut mock = state.lock();
    mock.replies.push((chat_id, text));
    ok(message(mock.replies.len() as i64, chat_id))
}

async fn start_mock(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route(&format!("/bot{TOKEN}/getFile"), post(get_file))
        .route(&format!("/bot{TOKEN}/forwardMessage"), post(forward_message))
        .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
        .route(&format!("/bot{TOKEN}/editMessageText"), post(send_message))
        .route(&format!("/file/bot{TOKEN}/documents/{{file_id}}"), get(download))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    address
}

fn client_for(address: SocketAddr) -> BotApiClient {
    client_with_limit(address, DEFAULT_MAX_DOWNLOAD_BYTES)
}

fn client_with_limit(address: SocketAddr, max_download_bytes: u64) -> BotApiClient {
    BotApiClient::new(&TelegramConfig {
        bot_token: Some(TOKEN.to_string()),
        storage_channel_id: Some(STORAGE_CHANNEL),
        api_base_url: format!("http://{address}"),
        poll_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
        max_download_bytes,
    })
    .unwrap()
}

fn video_update(file_id: &str, file_size: Option<u64>) -> Vec<Update> {
    let mut video = json!({
        "file_id": file_id,
        "file_unique_id": format!("u-{file_id}"),
        "file_name": "movie.mp4",
    });
    if let Some(size) = file_size {
        video["file_size"] = json!(size);
    }
    serde_json::from_value(json!([{
        "update_id": 7,
        "message": { "message_id": 20, "chat": { "id": 77 }, "video": video }
    }]))
    .unwrap()
}

fn reply_texts(mock: &Shared) -> Vec<String> {
    mock.lock()
        .replies
        .iter()
        .map(|(_, text)| text.clone())
        .collect()
}

#[tokio::test]
async fn test_window_fetch_through_bot_api() {
    let mock = Shared::default();
    let data = pattern(50_000);
    mock.lock().files.insert("doc-1".to_string(), data.clone());
    let address = start_mock(mock).await;

    let streaming = GatewayConfig::for_testing().streaming;
    let fetcher = ChunkedFetcher::new(
        Arc::new(TelegramBackend::new(client_for(address))),
        &streaming,
    );
    assert_eq!(fetcher.backend_type(), "telegram");

    let window = ByteWindow::new(20_000, 29_999).unwrap();
    let primed = fetcher
        .fetch_window(&BackendLocator::from("doc-1"), window)
        .await
        .unwrap();

    let mut received = Vec::new();
    let mut chunks = primed.into_stream();
    while let Some(chunk) = futures::StreamExt::next(&mut chunks).await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= streaming.chunk_size);
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, &data[20_000..30_000]);
    assert_eq!(fetcher.active_fetches().current(), 0);
}

#[tokio::test]
async fn test_unknown_file_id_maps_to_object_not_found() {
    let address = start_mock(Shared::default()).await;
    let fetcher = ChunkedFetcher::new(
        Arc::new(TelegramBackend::new(client_for(address))),
        &GatewayConfig::for_testing().streaming,
    );

    let result = fetcher
        .fetch_window(
            &BackendLocator::from("missing"),
            ByteWindow::new(0, 9).unwrap(),
        )
        .await;
    assert!(matches!(result, Err(FetchError::ObjectNotFound { .. })));
}

#[tokio::test]
async fn test_unreachable_api_maps_to_backend_unavailable() {
    // Bind and drop to get a port nothing listens on
    let address = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let fetcher = ChunkedFetcher::new(
        Arc::new(TelegramBackend::new(client_for(address))),
        &GatewayConfig::for_testing().streaming,
    );

    let result = fetcher
        .fetch_window(&BackendLocator::from("any"), ByteWindow::new(0, 0).unwrap())
        .await;
    assert!(matches!(result, Err(FetchError::BackendUnavailable { .. })));
}

#[tokio::test]
async fn test_poller_ingests_and_gateway_serves() {
    let mock = Shared::default();
    let data = pattern(40_000);
    mock.lock()
        .files
        .insert(STORED_FILE_ID.to_string(), data.clone());
    let address = start_mock(mock.clone()).await;
    let client = client_for(address);

    let store = Arc::new(InMemoryMetadataStore::new());
    let ingestor = Ingestor::new(store.clone(), "https://gate.example.com");
    let mut poller = UpdatePoller::new(client.clone(), ingestor, STORAGE_CHANNEL);

    let updates: Vec<Update> = serde_json::from_value(json!([
        {
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": { "id": 77 },
                "document": {
                    "file_id": "user-file",
                    "file_unique_id": "u-user",
                    "file_name": "holiday video.mp4",
                    "file_size": 40_000
                }
            }
        },
        {
            "update_id": 2,
            "message": { "message_id": 11, "chat": { "id": 77 }, "text": "hi" }
        }
    ]))
    .unwrap();
    poller.handle_updates(updates).await;

    {
        let mock = mock.lock();
        assert_eq!(mock.forwarded, vec![(STORAGE_CHANNEL, 77, 10)]);
        let texts: Vec<&str> = mock.replies.iter().map(|(_, text)| text.as_str()).collect();
        assert!(texts.iter().any(|t| t.contains("File is ready!")
            && t.contains("https://gate.example.com/api/view/user-file")
            && t.contains("https://gate.example.com/api/download/user-file")));
        assert!(texts.contains(&"Please send a file!"));
    }

    let record = store.get(&FileId::from("user-file")).await.unwrap();
    assert_eq!(record.locator().as_str(), STORED_FILE_ID);
    assert_eq!(record.display_name(), "holiday video.mp4");
    assert_eq!(record.size_bytes(), 40_000);

    // The recorded file streams through the gateway from the mock channel
    let streaming = GatewayConfig::for_testing().streaming;
    let fetcher = ChunkedFetcher::new(Arc::new(TelegramBackend::new(client)), &streaming);
    let router = build_router(AppState::new(store, fetcher, &streaming));
    let response = router
        .oneshot(
            axum::http::Request::get("/api/stream/user-file")
                .header("range", "bytes=39000-")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], &data[39_000..]);
}

#[tokio::test]
async fn test_file_over_download_limit_is_refused_at_ingest() {
    let mock = Shared::default();
    let address = start_mock(mock.clone()).await;
    let client = client_for(address);

    let store = Arc::new(InMemoryMetadataStore::new());
    let ingestor = Ingestor::new(store.clone(), "https://gate.example.com");
    let mut poller = UpdatePoller::new(client.clone(), ingestor, STORAGE_CHANNEL);
    poller
        .handle_updates(video_update("big-video", Some(50_000_000)))
        .await;

    let texts = reply_texts(&mock);
    assert!(
        texts
            .iter()
            .any(|t| t.starts_with("Error: File is too large to stream")),
        "{texts:?}"
    );
    assert!(!texts.iter().any(|t| t.contains("File is ready!")), "{texts:?}");
    assert!(mock.lock().forwarded.is_empty());
    assert_eq!(store.len().await, 0);

    // No link was handed out, and none resolves
    let streaming = GatewayConfig::for_testing().streaming;
    let fetcher = ChunkedFetcher::new(Arc::new(TelegramBackend::new(client)), &streaming);
    let response = build_router(AppState::new(store, fetcher, &streaming))
        .oneshot(
            axum::http::Request::get("/api/stream/big-video")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bot_api_too_big_reply_refuses_unsized_file() {
    let mock = Shared::default();
    mock.lock().oversized.insert(STORED_FILE_ID.to_string());
    let address = start_mock(mock.clone()).await;

    let store = Arc::new(InMemoryMetadataStore::new());
    let ingestor = Ingestor::new(store.clone(), "https://gate.example.com");
    let mut poller = UpdatePoller::new(client_for(address), ingestor, STORAGE_CHANNEL);
    poller.handle_updates(video_update("big-video", None)).await;

    let texts = reply_texts(&mock);
    assert!(
        texts.contains(&"Error: File is too large to stream".to_string()),
        "{texts:?}"
    );
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_raised_limit_accepts_large_files() {
    let mock = Shared::default();
    let address = start_mock(mock.clone()).await;

    let store = Arc::new(InMemoryMetadataStore::new());
    let ingestor = Ingestor::new(store.clone(), "https://gate.example.com");
    let client = client_with_limit(address, 2 * 1024 * 1024 * 1024);
    let mut poller = UpdatePoller::new(client, ingestor, STORAGE_CHANNEL);
    poller
        .handle_updates(video_update("big-video", Some(50_000_000)))
        .await;

    let texts = reply_texts(&mock);
    assert!(texts.iter().any(|t| t.contains("File is ready!")), "{texts:?}");
    let record = store.get(&FileId::from("big-video")).await.unwrap();
    assert_eq!(record.size_bytes(), 50_000_000);
}

#[tokio::test]
async fn test_too_big_download_maps_to_object_too_large() {
    let mock = Shared::default();
    mock.lock().oversized.insert("huge".to_string());
    let address = start_mock(mock).await;
    let fetcher = ChunkedFetcher::new(
        Arc::new(TelegramBackend::new(client_for(address))),
        &GatewayConfig::for_testing().streaming,
    );

    let result = fetcher
        .fetch_window(&BackendLocator::from("huge"), ByteWindow::new(0, 9).unwrap())
        .await;
    assert!(matches!(result, Err(FetchError::ObjectTooLarge { .. })));
    assert_eq!(fetcher.active_fetches().current(), 0);
}
