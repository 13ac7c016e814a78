//! JSON API endpoints

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::server::AppState;

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub store: &'static str,
    pub backend: &'static str,
    pub files: usize,
    pub active_fetches: usize,
    pub chunk_size: usize,
    pub uptime_seconds: u64,
}

pub async fn api_health(State(state): State<AppState>) -> Json<HealthReport> {
    let fetcher = state.responder.fetcher();
    Json(HealthReport {
        status: "ok",
        store: state.store.store_type(),
        backend: fetcher.backend_type(),
        files: state.store.len().await,
        active_fetches: fetcher.active_fetches().current(),
        chunk_size: fetcher.chunk_size(),
        uptime_seconds: state.server_started_at.elapsed().as_secs(),
    })
}
