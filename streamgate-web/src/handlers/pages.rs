//! HTML and plain-text pages

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Response};
use streamgate_core::FileId;

use crate::server::AppState;
use crate::streaming::ResponseError;
use crate::templates;

/// Liveness text served at `/`.
pub const INDEX_TEXT: &str = "Streamgate file streamer is running!";

pub async fn index_page() -> &'static str {
    INDEX_TEXT
}

/// `GET /api/view/{file_id}`: player or download page for the file.
pub async fn view_page(State(state): State<AppState>, Path(file_id): Path<String>) -> Response {
    match state.store.get(&FileId::from(file_id)).await {
        Ok(record) => Html(templates::view_page(&record)).into_response(),
        Err(e) => ResponseError::from(e).into_response(),
    }
}
