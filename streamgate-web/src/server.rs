//! HTTP server for Streamgate
//!
//! Read-only surface over the metadata store: files are streamed, downloaded
//! or viewed by id. Nothing here writes to the store.

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::get;
use streamgate_core::config::{ServerConfig, StreamingConfig};
use streamgate_core::{ChunkedFetcher, GatewayError, MetadataStore};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::{api_health, download_file, index_page, stream_file, view_page};
use crate::streaming::StreamingResponder;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub responder: Arc<StreamingResponder>,
    pub server_started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fetcher: ChunkedFetcher,
        config: &StreamingConfig,
    ) -> Self {
        let responder = StreamingResponder::new(store.clone(), fetcher, config);
        Self {
            store,
            responder: Arc::new(responder),
            server_started_at: Instant::now(),
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/stream/{file_id}", get(stream_file))
        .route("/api/download/{file_id}", get(download_file))
        .route("/api/view/{file_id}", get(view_page))
        .route("/api/health", get(api_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the configured address and serves until `shutdown` resolves.
///
/// # Errors
///
/// - `GatewayError::Io` - If the address cannot be bound or the server fails
pub async fn run_server(
    state: AppState,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), GatewayError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    serve(listener, state, shutdown, config.shutdown_grace).await
}

/// Serves on an already bound listener until `shutdown` resolves.
///
/// In-flight streams get up to `drain` to finish once `shutdown` resolves;
/// connections still open after that are abandoned.
///
/// # Errors
///
/// - `GatewayError::Io` - If accepting connections fails
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
    drain: Duration,
) -> Result<(), GatewayError> {
    let address = listener.local_addr()?;
    info!(
        %address,
        store = state.store.store_type(),
        backend = state.responder.fetcher().backend_type(),
        "Streamgate listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let signal = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };
    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = signalled_rx => {
            info!(grace = ?drain, "Draining open streams");
            match tokio::time::timeout(drain, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(grace = ?drain, "Shutdown grace elapsed, abandoning open streams"),
            }
        }
    }

    info!("Server stopped");
    Ok(())
}
