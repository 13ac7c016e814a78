//! Streamgate Core - Range-aware streaming over whole-object storage backends
//!
//! This crate provides the building blocks of the streaming gateway: the
//! ephemeral file metadata store, HTTP `Range` resolution, the chunked
//! fetcher that turns a whole-object backend download into a window of
//! bytes, the Telegram storage backend and ingestion, and configuration.

pub mod backend;
pub mod config;
pub mod fetcher;
pub mod ingest;
pub mod metadata;
pub mod mode;
pub mod range;
pub mod telegram;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use backend::{FetchError, ObjectBody, StorageBackend};
pub use config::GatewayConfig;
pub use fetcher::{
    ActiveFetches, ChunkStream, ChunkedFetcher, ObjectSource, PrimedWindow, WindowReader,
};
pub use ingest::{FileEvent, IngestReceipt, Ingestor};
pub use metadata::{
    BackendLocator, FileId, FileRecord, InMemoryMetadataStore, MetadataStore, StoreError,
};
pub use mode::RuntimeMode;
pub use range::{ByteWindow, RangeResolution, resolve_range};

/// Core errors that can bubble up from any Streamgate subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backend fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] telegram::BotApiError),

    #[error("File of {size_bytes} bytes exceeds the {limit_bytes} byte download limit")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Store(e) => match e {
                StoreError::NotFound { .. } => "File not found".to_string(),
                _ => "File metadata could not be recorded".to_string(),
            },
            GatewayError::Fetch(e) => match e {
                FetchError::TimedOut { .. } => "Storage backend timed out".to_string(),
                FetchError::ObjectTooLarge { .. } => {
                    "File is too large for the storage backend to serve".to_string()
                }
                FetchError::ObjectNotFound { .. } => {
                    "File is no longer available in storage".to_string()
                }
                _ => "Storage backend error occurred".to_string(),
            },
            GatewayError::FileTooLarge {
                size_bytes,
                limit_bytes,
            } => format!(
                "File is too large to stream ({:.2} MB, the limit is {:.2} MB)",
                megabytes(*size_bytes),
                megabytes(*limit_bytes)
            ),
            GatewayError::Telegram(e) if e.is_too_big() => {
                "File is too large to stream".to_string()
            }
            GatewayError::Telegram(_) => "Telegram API error occurred".to_string(),
            GatewayError::Configuration { reason } => format!("Configuration error: {reason}"),
            GatewayError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to operator or caller input.
    pub fn is_user_error(&self) -> bool {
        match self {
            GatewayError::Configuration { .. }
            | GatewayError::FileTooLarge { .. }
            | GatewayError::Store(StoreError::NotFound { .. }) => true,
            GatewayError::Telegram(e) => e.is_too_big(),
            _ => false,
        }
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_user_messages() {
        let not_found = GatewayError::from(StoreError::NotFound {
            id: FileId::from("abc"),
        });
        assert_eq!(not_found.user_message(), "File not found");
        assert!(not_found.is_user_error());

        let timed_out = GatewayError::from(FetchError::TimedOut {
            limit: Duration::from_secs(5),
        });
        assert_eq!(timed_out.user_message(), "Storage backend timed out");
        assert!(!timed_out.is_user_error());

        let config = GatewayError::Configuration {
            reason: "missing bot token".to_string(),
        };
        assert!(config.user_message().contains("missing bot token"));
        assert!(config.is_user_error());

        let too_large = GatewayError::FileTooLarge {
            size_bytes: 50 * 1_048_576,
            limit_bytes: 20 * 1_048_576,
        };
        assert_eq!(
            too_large.user_message(),
            "File is too large to stream (50.00 MB, the limit is 20.00 MB)"
        );
        assert!(too_large.is_user_error());

        let refused = GatewayError::from(telegram::BotApiError::Api {
            code: 400,
            description: "Bad Request: file is too big".to_string(),
        });
        assert_eq!(refused.user_message(), "File is too large to stream");
        assert!(refused.is_user_error());
    }
}
