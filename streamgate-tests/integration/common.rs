//! Shared harness: a gateway over the simulated backend.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use streamgate_core::config::{GatewayConfig, StreamingConfig};
use streamgate_core::{
    ActiveFetches, BackendLocator, ChunkedFetcher, FileEvent, FileId, InMemoryMetadataStore,
    IngestReceipt, Ingestor,
};
use streamgate_sim::InMemoryBackend;
use streamgate_web::{AppState, build_router};
use tower::ServiceExt;

/// Deterministic, non-repeating-looking test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

pub struct TestGateway {
    pub store: Arc<InMemoryMetadataStore>,
    pub backend: Arc<InMemoryBackend>,
    pub ingestor: Ingestor,
    pub state: AppState,
    active: ActiveFetches,
}

/// Captured response.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestGateway {
    /// Gateway with small chunks and pieces so windows span many of both.
    pub fn new() -> Self {
        Self::with_backend(
            InMemoryBackend::new().with_piece_size(700),
            GatewayConfig::for_testing().streaming,
        )
    }

    pub fn with_backend(backend: InMemoryBackend, streaming: StreamingConfig) -> Self {
        let store = Arc::new(InMemoryMetadataStore::new());
        let backend = Arc::new(backend);
        let fetcher = ChunkedFetcher::new(backend.clone(), &streaming);
        let active = fetcher.active_fetches().clone();
        let ingestor = Ingestor::new(store.clone(), "http://streamgate.test");
        let state = AppState::new(store.clone(), fetcher, &streaming);

        Self {
            store,
            backend,
            ingestor,
            state,
            active,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn active_fetches(&self) -> usize {
        self.active.current()
    }

    /// Places `data` in the backend and ingests it under `id`.
    pub async fn add_file(&self, id: &str, name: &str, data: &[u8]) -> IngestReceipt {
        let locator = format!("loc-{id}");
        self.backend.insert(&locator, data.to_vec());
        self.ingestor
            .ingest(FileEvent {
                id: FileId::from(id),
                file_name: name.to_string(),
                size_bytes: data.len() as u64,
                locator: BackendLocator::new(locator),
            })
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, range: Option<&str>) -> Reply {
        let mut request = Request::get(uri);
        if let Some(range) = range {
            request = request.header("range", range);
        }
        let response = self
            .router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply {
            status,
            headers,
            body,
        }
    }

    /// Waits until no backend transfer is open, or `limit` passes.
    pub async fn wait_for_release(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if self.active_fetches() == 0 && self.backend.live_bodies() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
