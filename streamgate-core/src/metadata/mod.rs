//! File metadata records and the store that maps file ids to them
//!
//! The store is a cache, not a database: records live for the lifetime of
//! the process and are lost on restart. Gateway code depends only on the
//! [`MetadataStore`] trait so a persistent implementation can replace the
//! in-memory one without touching request handling.

pub mod memory;
pub mod sanitize;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
pub use memory::InMemoryMetadataStore;
pub use sanitize::sanitize_display_name;
use serde::Serialize;

/// Opaque, caller-supplied identifier naming a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Creates a file id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference a storage backend resolves to object bytes.
///
/// For the Telegram backend this is the file id of the copy held in the
/// storage channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BackendLocator(String);

impl BackendLocator {
    /// Creates a locator from any string-like value.
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Returns the locator as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BackendLocator {
    fn from(locator: &str) -> Self {
        Self(locator.to_string())
    }
}

impl fmt::Display for BackendLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the gateway knows about one ingested file.
///
/// Fields are private so the display name is always sanitized and the
/// record cannot be mutated once it has been handed to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    id: FileId,
    display_name: String,
    size_bytes: u64,
    locator: BackendLocator,
}

impl FileRecord {
    /// Builds a record, sanitizing `file_name` into the display name.
    pub fn new(
        id: impl Into<FileId>,
        file_name: &str,
        size_bytes: u64,
        locator: BackendLocator,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: sanitize_display_name(file_name),
            size_bytes,
            locator,
        }
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn locator(&self) -> &BackendLocator {
        &self.locator
    }

    /// MIME type inferred from the display name's extension.
    ///
    /// Falls back to `application/octet-stream` for unknown extensions.
    pub fn mime_type(&self) -> mime_guess::Mime {
        mime_guess::from_path(&self.display_name).first_or_octet_stream()
    }
}

/// Errors raised by metadata store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the id
    #[error("File not found: {id}")]
    NotFound {
        /// The id that was looked up
        id: FileId,
    },

    /// The id is already bound to a different backend object
    #[error("File {id} is already stored under locator {existing}")]
    LocatorConflict {
        /// The id being written
        id: FileId,
        /// Locator recorded first
        existing: BackendLocator,
    },

    /// The recorded size of a file cannot change
    #[error("File {id} was recorded with {recorded} bytes, refusing {attempted}")]
    SizeConflict {
        /// The id being written
        id: FileId,
        /// Size recorded first
        recorded: u64,
        /// Size in the rejected write
        attempted: u64,
    },

    /// Backing storage failed (persistent implementations only)
    #[error("Store backend error: {reason}")]
    Backend {
        /// Description of the failure
        reason: String,
    },
}

/// Mapping from file id to [`FileRecord`].
///
/// Implementations must be safe under concurrent `put`/`get` from many
/// request tasks and must never expose a partially written record. Writes
/// for a given id are single-writer; no ordering is promised across ids.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Inserts or overwrites the record keyed by `record.id()`.
    ///
    /// Overwriting is allowed only when the locator and size are unchanged.
    ///
    /// # Errors
    /// - `StoreError::LocatorConflict` - Id already bound to another locator
    /// - `StoreError::SizeConflict` - Id already recorded with another size
    /// - `StoreError::Backend` - Backing storage failed
    async fn put(&self, record: FileRecord) -> Result<(), StoreError>;

    /// Looks up the record for `id`.
    ///
    /// # Errors
    /// - `StoreError::NotFound` - Unknown id
    /// - `StoreError::Backend` - Backing storage failed
    async fn get(&self, id: &FileId) -> Result<Arc<FileRecord>, StoreError>;

    /// Number of records currently held.
    async fn len(&self) -> usize;

    /// Name of the storage mechanism, for logs and health output.
    fn store_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sanitizes_name() {
        let record = FileRecord::new(
            "id-1",
            "My Movie (2020)/final?.mp4",
            42,
            BackendLocator::from("loc"),
        );
        assert_eq!(record.display_name(), "My Movie _2020__final_.mp4");
        assert_eq!(record.size_bytes(), 42);
        assert_eq!(record.id().as_str(), "id-1");
    }

    #[test]
    fn test_record_mime_type() {
        let video = FileRecord::new("a", "clip.mp4", 1, BackendLocator::from("x"));
        assert_eq!(video.mime_type().essence_str(), "video/mp4");

        let audio = FileRecord::new("b", "song.mp3", 1, BackendLocator::from("x"));
        assert_eq!(audio.mime_type().type_(), mime_guess::mime::AUDIO);

        let unknown = FileRecord::new("c", "blob.zzqx", 1, BackendLocator::from("x"));
        assert_eq!(unknown.mime_type().essence_str(), "application/octet-stream");

        let no_extension = FileRecord::new("d", "README", 1, BackendLocator::from("x"));
        assert_eq!(
            no_extension.mime_type().essence_str(),
            "application/octet-stream"
        );
    }
}
