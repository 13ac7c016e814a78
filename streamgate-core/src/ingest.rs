//! Ingestion contract: turning an inbound file into a served file
//!
//! Whatever receives files (the Telegram poller, the development seeder)
//! describes each one as a [`FileEvent`]. The [`Ingestor`] records it in the
//! metadata store and hands back the links users can open. Population is
//! push-only; the HTTP surface never writes to the store.

use std::sync::Arc;

use tracing::info;

use crate::metadata::{BackendLocator, FileId, FileRecord, MetadataStore, StoreError};

/// A file that has been placed in backend storage and is ready to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub id: FileId,
    /// Raw name as supplied by the sender, sanitized on ingest
    pub file_name: String,
    pub size_bytes: u64,
    pub locator: BackendLocator,
}

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub id: FileId,
    pub display_name: String,
    pub size_bytes: u64,
    pub view_url: String,
    pub download_url: String,
}

impl IngestReceipt {
    /// Human-readable summary sent back to whoever uploaded the file.
    pub fn summary(&self) -> String {
        format!(
            "File is ready!\n\nName: {}\nSize: {:.2} MB\n\nView URL: {}\nDirect Download: {}",
            self.display_name,
            self.size_bytes as f64 / 1_048_576.0,
            self.view_url,
            self.download_url
        )
    }
}

/// Records ingested files and builds their public links.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn MetadataStore>,
    public_base_url: String,
}

impl Ingestor {
    /// Creates an ingestor writing to `store`.
    ///
    /// `public_base_url` is the externally reachable origin, e.g.
    /// `https://files.example.com`; a trailing slash is ignored.
    pub fn new(store: Arc<dyn MetadataStore>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            store,
            public_base_url,
        }
    }

    /// Records `event` and returns the links for it.
    ///
    /// Re-sending a file that is already recorded under another locator
    /// keeps the first binding and returns its receipt.
    ///
    /// # Errors
    /// - `StoreError::SizeConflict` - Id already recorded with another size
    pub async fn ingest(&self, event: FileEvent) -> Result<IngestReceipt, StoreError> {
        let record = FileRecord::new(
            event.id.clone(),
            &event.file_name,
            event.size_bytes,
            event.locator,
        );

        match self.store.put(record.clone()).await {
            Ok(()) => {
                let receipt = self.receipt_for(&record);
                info!(
                    id = %receipt.id,
                    name = %receipt.display_name,
                    size = receipt.size_bytes,
                    "Ingested file"
                );
                Ok(receipt)
            }
            Err(StoreError::LocatorConflict { id, existing }) => {
                let recorded = self.store.get(&id).await?;
                if recorded.size_bytes() != record.size_bytes() {
                    return Err(StoreError::SizeConflict {
                        id,
                        recorded: recorded.size_bytes(),
                        attempted: record.size_bytes(),
                    });
                }
                info!(
                    %id,
                    %existing,
                    ignored = %record.locator(),
                    "File already ingested, keeping first copy"
                );
                Ok(self.receipt_for(&recorded))
            }
            Err(e) => Err(e),
        }
    }

    fn receipt_for(&self, record: &FileRecord) -> IngestReceipt {
        IngestReceipt {
            id: record.id().clone(),
            display_name: record.display_name().to_string(),
            size_bytes: record.size_bytes(),
            view_url: self.file_url("view", record.id()),
            download_url: self.file_url("download", record.id()),
        }
    }

    /// Public URL of `/api/<endpoint>/<id>`.
    pub fn file_url(&self, endpoint: &str, id: &FileId) -> String {
        format!(
            "{}/api/{endpoint}/{}",
            self.public_base_url,
            urlencoding::encode(id.as_str())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadataStore;

    fn event(id: &str, name: &str, size: u64, locator: &str) -> FileEvent {
        FileEvent {
            id: FileId::from(id),
            file_name: name.to_string(),
            size_bytes: size,
            locator: BackendLocator::from(locator),
        }
    }

    #[tokio::test]
    async fn test_ingest_records_and_links() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let ingestor = Ingestor::new(store.clone(), "https://gate.example.com/");

        let receipt = ingestor
            .ingest(event("BQACAgI", "My Clip!.mp4", 3 * 1_048_576, "loc-1"))
            .await
            .unwrap();

        assert_eq!(receipt.display_name, "My Clip_.mp4");
        assert_eq!(receipt.view_url, "https://gate.example.com/api/view/BQACAgI");
        assert_eq!(
            receipt.download_url,
            "https://gate.example.com/api/download/BQACAgI"
        );

        let record = store.get(&FileId::from("BQACAgI")).await.unwrap();
        assert_eq!(record.locator().as_str(), "loc-1");
        assert_eq!(record.size_bytes(), 3 * 1_048_576);
    }

    #[tokio::test]
    async fn test_reingest_returns_first_receipt() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let ingestor = Ingestor::new(store.clone(), "http://localhost:8080");

        let first = ingestor.ingest(event("a", "x.bin", 1, "loc-1")).await.unwrap();
        let again = ingestor.ingest(event("a", "y.bin", 1, "loc-2")).await.unwrap();
        assert_eq!(again, first);
        assert_eq!(again.display_name, "x.bin");

        let record = store.get(&FileId::from("a")).await.unwrap();
        assert_eq!(record.locator().as_str(), "loc-1");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reingest_with_other_size_is_rejected() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let ingestor = Ingestor::new(store.clone(), "http://localhost:8080");

        ingestor.ingest(event("a", "x.bin", 1, "loc-1")).await.unwrap();
        let result = ingestor.ingest(event("a", "x.bin", 2, "loc-2")).await;
        assert!(matches!(
            result,
            Err(StoreError::SizeConflict {
                recorded: 1,
                attempted: 2,
                ..
            })
        ));
        let record = store.get(&FileId::from("a")).await.unwrap();
        assert_eq!(record.locator().as_str(), "loc-1");
    }

    #[test]
    fn test_file_url_encodes_id() {
        let ingestor = Ingestor::new(Arc::new(InMemoryMetadataStore::new()), "http://h");
        assert_eq!(
            ingestor.file_url("stream", &FileId::from("a b/c")),
            "http://h/api/stream/a%20b%2Fc"
        );
    }

    #[test]
    fn test_receipt_summary() {
        let receipt = IngestReceipt {
            id: FileId::from("x"),
            display_name: "song.mp3".to_string(),
            size_bytes: 1_572_864,
            view_url: "http://h/api/view/x".to_string(),
            download_url: "http://h/api/download/x".to_string(),
        };
        let summary = receipt.summary();
        assert!(summary.contains("Name: song.mp3"));
        assert!(summary.contains("Size: 1.50 MB"));
        assert!(summary.contains("http://h/api/download/x"));
    }
}
