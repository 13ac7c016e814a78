//! Storage backend abstraction
//!
//! A backend can only download whole objects. It cannot read an arbitrary
//! byte range; the [`ChunkedFetcher`](crate::fetcher::ChunkedFetcher) turns
//! one whole-object download into the window a request needs.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::metadata::BackendLocator;

/// Progressive byte stream of a whole backend object.
pub type ObjectStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// A backend object opened for download.
///
/// The stream yields the object from its first byte, in arbitrarily sized
/// pieces, as the download progresses. Dropping it aborts the download.
pub struct ObjectBody {
    /// Object length announced by the backend, if it announced one
    pub declared_len: Option<u64>,
    /// The object bytes
    pub stream: ObjectStream,
}

impl ObjectBody {
    /// Wraps a stream with an optional announced length.
    pub fn new(declared_len: Option<u64>, stream: ObjectStream) -> Self {
        Self {
            declared_len,
            stream,
        }
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("declared_len", &self.declared_len)
            .finish_non_exhaustive()
    }
}

/// Errors raised while opening or reading a backend object.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Transport or authentication failure talking to the backend
    #[error("Storage backend unavailable: {reason}")]
    BackendUnavailable {
        /// Description of the failure
        reason: String,
    },

    /// The locator no longer resolves to an object
    #[error("Object not found for locator {locator}")]
    ObjectNotFound {
        /// The stale locator
        locator: BackendLocator,
    },

    /// The object exists but the backend refuses to hand it out at this size
    #[error("Object {locator} exceeds the storage backend download limit")]
    ObjectTooLarge {
        /// The oversized object
        locator: BackendLocator,
    },

    /// The download broke off before the requested bytes arrived
    #[error("Fetch interrupted: {reason}")]
    FetchInterrupted {
        /// Description of the interruption
        reason: String,
    },

    /// Opening the object and receiving its first bytes took too long
    #[error("Storage backend did not respond within {limit:?}")]
    TimedOut {
        /// The bound that was exceeded
        limit: Duration,
    },
}

/// Remote object storage that serves whole objects.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Starts downloading the object behind `locator`.
    ///
    /// Exactly one backend round trip per call. The returned body must be
    /// dropped to release the transfer early.
    ///
    /// # Errors
    /// - `FetchError::BackendUnavailable` - Transport or auth failure
    /// - `FetchError::ObjectNotFound` - Locator no longer resolves
    /// - `FetchError::ObjectTooLarge` - Object is beyond the backend's download cap
    async fn open_object(&self, locator: &BackendLocator) -> Result<ObjectBody, FetchError>;

    /// Name of this backend, for logs and health output.
    fn backend_type(&self) -> &'static str;
}
