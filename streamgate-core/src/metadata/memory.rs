//! In-memory metadata store

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FileId, FileRecord, MetadataStore, StoreError};

/// Process-lifetime metadata store backed by a lock-guarded `HashMap`.
///
/// Records are stored behind `Arc` and swapped in whole, so a reader either
/// sees the previous record or the new one, never a mix. The lock is never
/// held across an await point. There is no eviction: capacity is bounded
/// only by process memory.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<FileId, Arc<FileRecord>>>,
}

impl InMemoryMetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, record: FileRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();

        match records.entry(record.id().clone()) {
            Entry::Vacant(slot) => {
                tracing::debug!(
                    id = %record.id(),
                    size = record.size_bytes(),
                    "Recorded new file"
                );
                slot.insert(Arc::new(record));
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                if existing.locator() != record.locator() {
                    return Err(StoreError::LocatorConflict {
                        id: record.id().clone(),
                        existing: existing.locator().clone(),
                    });
                }
                if existing.size_bytes() != record.size_bytes() {
                    return Err(StoreError::SizeConflict {
                        id: record.id().clone(),
                        recorded: existing.size_bytes(),
                        attempted: record.size_bytes(),
                    });
                }
                slot.insert(Arc::new(record));
            }
        }

        Ok(())
    }

    async fn get(&self, id: &FileId) -> Result<Arc<FileRecord>, StoreError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    async fn len(&self) -> usize {
        self.records.read().len()
    }

    fn store_type(&self) -> &'static str {
        "in_memory"
    }
}
