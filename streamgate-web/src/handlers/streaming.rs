//! Byte-serving endpoints

use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use streamgate_core::FileId;

use crate::server::AppState;

/// `GET /api/stream/{file_id}`: inline, honors `Range`.
pub async fn stream_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    // A header that is not visible ASCII can only be malformed
    let range = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default());

    state
        .responder
        .stream(&FileId::from(file_id), range)
        .await
        .into_response()
}

/// `GET /api/download/{file_id}`: whole file as an attachment.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Response {
    state
        .responder
        .download(&FileId::from(file_id))
        .await
        .into_response()
}
