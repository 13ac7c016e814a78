//! Development library seeding
//!
//! Loads every regular file under a directory into an [`InMemoryBackend`]
//! and records it through the [`Ingestor`], so the HTTP surface can be used
//! without a Telegram bot.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use streamgate_core::{BackendLocator, FileEvent, FileId, IngestReceipt, Ingestor, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::InMemoryBackend;

type SeedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<IngestReceipt>>> + Send + 'a>>;

/// Loads the files under `dir` into `backend` and ingests them.
///
/// Hidden files and directories are skipped. Each file gets a fresh random
/// id; its locator is `sim/<id>`. Unreadable subdirectories are logged and
/// skipped.
///
/// # Errors
///
/// - `GatewayError::Io` - If `dir` itself cannot be read
/// - `GatewayError::Store` - If ingesting a file fails
pub async fn seed_directory(
    dir: &Path,
    ingestor: &Ingestor,
    backend: &InMemoryBackend,
) -> Result<Vec<IngestReceipt>> {
    let receipts = seed_recursive(dir, ingestor, backend).await?;
    info!(
        dir = %dir.display(),
        files = receipts.len(),
        "Seeded development library"
    );
    Ok(receipts)
}

fn seed_recursive<'a>(
    dir: &'a Path,
    ingestor: &'a Ingestor,
    backend: &'a InMemoryBackend,
) -> SeedFuture<'a> {
    Box::pin(async move {
        let mut receipts = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                match seed_recursive(&path, ingestor, backend).await {
                    Ok(nested) => receipts.extend(nested),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping directory"),
                }
            } else if file_type.is_file() {
                let data = tokio::fs::read(&path).await?;
                let id = Uuid::new_v4().simple().to_string();
                let locator = format!("sim/{id}");
                let size_bytes = data.len() as u64;

                backend.insert(&locator, data);
                let receipt = ingestor
                    .ingest(FileEvent {
                        id: FileId::new(id),
                        file_name: name,
                        size_bytes,
                        locator: BackendLocator::new(locator),
                    })
                    .await?;
                receipts.push(receipt);
            }
        }

        Ok(receipts)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use streamgate_core::{InMemoryMetadataStore, MetadataStore};

    use super::*;

    #[tokio::test]
    async fn test_seed_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("movie.mp4"), vec![1u8; 2048]).unwrap();
        std::fs::write(dir.path().join(".hidden"), b"skip").unwrap();
        std::fs::create_dir(dir.path().join("music")).unwrap();
        std::fs::write(dir.path().join("music").join("song.mp3"), b"la la").unwrap();

        let store = Arc::new(InMemoryMetadataStore::new());
        let backend = InMemoryBackend::new();
        let ingestor = Ingestor::new(store.clone(), "http://localhost:8080");

        let mut receipts = seed_directory(dir.path(), &ingestor, &backend)
            .await
            .unwrap();
        receipts.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].display_name, "movie.mp4");
        assert_eq!(receipts[0].size_bytes, 2048);
        assert_eq!(receipts[1].display_name, "song.mp3");
        assert_eq!(store.len().await, 2);
        assert_eq!(backend.object_count(), 2);

        let record = store.get(&receipts[1].id).await.unwrap();
        assert!(record.locator().as_str().starts_with("sim/"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let ingestor = Ingestor::new(store, "http://localhost:8080");
        let result = seed_directory(
            Path::new("/nonexistent/streamgate"),
            &ingestor,
            &InMemoryBackend::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
