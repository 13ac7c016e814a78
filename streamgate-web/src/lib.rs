//! Streamgate Web - HTTP streaming surface
//!
//! Serves files recorded in the metadata store over HTTP with byte-range
//! support, plus a small HTML viewer and a health endpoint.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod handlers;
pub mod server;
pub mod streaming;
pub mod templates;

// Re-export main types
pub use server::{AppState, build_router, run_server, serve};
pub use streaming::{ResponseError, StreamPhase, StreamingResponder};
