//! Turns a file id and an optional `Range` header into an HTTP response.
//!
//! Everything that can fail cleanly happens before the response exists:
//! metadata lookup, range resolution, opening the backend object and
//! receiving its first chunk. After that the body is a [`TrackedBody`] and
//! failures can only terminate the connection.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode, header};
use axum::response::IntoResponse;
use streamgate_core::config::{MalformedRangePolicy, StreamingConfig};
use streamgate_core::{
    ByteWindow, ChunkedFetcher, FetchError, FileId, FileRecord, MetadataStore, RangeResolution,
    StoreError, resolve_range,
};
use tracing::{debug, error, warn};

use super::body::TrackedBody;

/// Errors answered with a status code, before any body byte is written.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("File not found: {id}")]
    NotFound { id: FileId },

    #[error("Malformed Range header: {header:?}")]
    MalformedRange { header: String },

    #[error("Range not satisfiable for a {size} byte file")]
    Unsatisfiable { size: u64 },

    #[error("Storage backend failed: {0}")]
    Backend(FetchError),

    #[error("Storage backend timed out after {limit:?}")]
    Timeout { limit: Duration },

    #[error("Metadata store failed: {0}")]
    Store(StoreError),
}

impl ResponseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResponseError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResponseError::MalformedRange { .. } => StatusCode::BAD_REQUEST,
            ResponseError::Unsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ResponseError::Backend(_) | ResponseError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ResponseError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn body_text(&self) -> &'static str {
        match self {
            ResponseError::NotFound { .. } => "File not found",
            ResponseError::MalformedRange { .. } => "Invalid Range header",
            ResponseError::Unsatisfiable { .. } => "Requested range not satisfiable",
            ResponseError::Backend(_) | ResponseError::Store(_) => "Error streaming file",
            ResponseError::Timeout { .. } => "Storage backend timed out",
        }
    }
}

impl From<StoreError> for ResponseError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { id } => ResponseError::NotFound { id },
            other => ResponseError::Store(other),
        }
    }
}

impl From<FetchError> for ResponseError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::TimedOut { limit } => ResponseError::Timeout { limit },
            other => ResponseError::Backend(other),
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code(), self.body_text()).into_response();

        if let ResponseError::Unsatisfiable { size } = self
            && let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}"))
        {
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_RANGE, value);
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }

        response
    }
}

/// How the client should treat the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Play or display in the browser
    Inline,
    /// Save to disk
    Attachment,
}

impl Disposition {
    fn header_value(self, file_name: &str) -> String {
        let kind = match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };
        format!("{kind}; filename=\"{file_name}\"")
    }
}

/// The part of a file a response will carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    /// Whole file, 200
    Full,
    /// Byte window, 206
    Partial(ByteWindow),
}

/// Serves stored files over HTTP, range-aware.
pub struct StreamingResponder {
    store: Arc<dyn MetadataStore>,
    fetcher: ChunkedFetcher,
    malformed_range: MalformedRangePolicy,
}

impl StreamingResponder {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fetcher: ChunkedFetcher,
        config: &StreamingConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            malformed_range: config.malformed_range,
        }
    }

    pub fn fetcher(&self) -> &ChunkedFetcher {
        &self.fetcher
    }

    /// Inline response honoring `Range`.
    ///
    /// # Errors
    /// - `ResponseError::NotFound` - Unknown id
    /// - `ResponseError::MalformedRange` - Unparseable header under the strict policy
    /// - `ResponseError::Unsatisfiable` - Range starts past the end of the file
    /// - `ResponseError::Backend` / `ResponseError::Timeout` - Backend failed before headers
    pub async fn stream(
        &self,
        id: &FileId,
        range_header: Option<&str>,
    ) -> Result<Response<Body>, ResponseError> {
        let record = self.store.get(id).await?;

        let plan = match resolve_range(range_header, record.size_bytes()) {
            RangeResolution::Full => Plan::Full,
            RangeResolution::Partial(window) => Plan::Partial(window),
            RangeResolution::Unsatisfiable => {
                debug!(%id, range = ?range_header, size = record.size_bytes(), "Unsatisfiable range");
                return Err(ResponseError::Unsatisfiable {
                    size: record.size_bytes(),
                });
            }
            RangeResolution::Malformed => {
                let header = range_header.unwrap_or_default().to_string();
                match self.malformed_range {
                    MalformedRangePolicy::Lenient => {
                        debug!(%id, %header, "Ignoring malformed Range header");
                        Plan::Full
                    }
                    MalformedRangePolicy::Reject => {
                        return Err(ResponseError::MalformedRange { header });
                    }
                }
            }
        };

        self.respond(&record, plan, Disposition::Inline).await
    }

    /// Whole-file attachment response. `Range` is not consulted.
    ///
    /// # Errors
    /// - `ResponseError::NotFound` - Unknown id
    /// - `ResponseError::Backend` / `ResponseError::Timeout` - Backend failed before headers
    pub async fn download(&self, id: &FileId) -> Result<Response<Body>, ResponseError> {
        let record = self.store.get(id).await?;
        self.respond(&record, Plan::Full, Disposition::Attachment)
            .await
    }

    async fn respond(
        &self,
        record: &FileRecord,
        plan: Plan,
        disposition: Disposition,
    ) -> Result<Response<Body>, ResponseError> {
        let size = record.size_bytes();
        let (status, window) = match plan {
            Plan::Partial(window) => (StatusCode::PARTIAL_CONTENT, Some(window)),
            Plan::Full => (StatusCode::OK, ByteWindow::full(size)),
        };

        let body = match window {
            // Zero-length file: nothing to fetch
            None => Body::empty(),
            Some(window) => {
                let primed = self
                    .fetcher
                    .fetch_window(record.locator(), window)
                    .await
                    .map_err(|e| {
                        match &e {
                            FetchError::TimedOut { .. } => {
                                warn!(id = %record.id(), %window, error = %e, "Backend timed out before headers")
                            }
                            _ => {
                                error!(id = %record.id(), %window, error = %e, "Backend failed before headers")
                            }
                        }
                        ResponseError::from(e)
                    })?;
                let tracked = TrackedBody::new(primed.into_stream(), record.id().clone(), window);
                Body::from_stream(tracked)
            }
        };

        let content_length = window.map_or(0, |w| w.len());
        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, record.mime_type().as_ref())
            .header(header::CONTENT_LENGTH, content_length)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(
                header::CONTENT_DISPOSITION,
                disposition.header_value(record.display_name()),
            )
            .header(header::LAST_MODIFIED, http_date_now());

        if let Plan::Partial(window) = plan {
            builder = builder.header(header::CONTENT_RANGE, window.content_range(size));
        }

        debug!(
            id = %record.id(),
            status = status.as_u16(),
            content_length,
            "Streaming response headers committed"
        );

        builder.body(body).map_err(|e| {
            error!(id = %record.id(), error = %e, "Failed to build response");
            ResponseError::Backend(FetchError::BackendUnavailable {
                reason: format!("invalid response headers: {e}"),
            })
        })
    }
}

/// Current time in IMF-fixdate form.
fn http_date_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
