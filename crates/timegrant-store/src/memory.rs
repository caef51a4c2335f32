//! In-memory implementation of the SnapshotStore trait.
//!
//! This is primarily for testing. It keeps the encoded JSON document, so
//! saves and loads go through the same format as the file store.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::format::Snapshot;
use crate::traits::SnapshotStore;

/// In-memory snapshot store.
///
/// All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    document: Option<Vec<u8>>,
    saves: usize,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `snapshot`.
    pub fn with_snapshot(snapshot: &Snapshot) -> Result<Self> {
        let store = Self::new();
        store.inner.lock().document = Some(snapshot.to_json()?);
        Ok(store)
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    /// The raw document last written, if any.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.inner.lock().document.clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Snapshot> {
        let document = self.inner.lock().document.clone();
        match document {
            Some(bytes) => Snapshot::from_json(&bytes),
            None => Ok(Snapshot::new()),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = snapshot.to_json()?;
        let mut inner = self.inner.lock();
        inner.document = Some(bytes);
        inner.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use timegrant_core::{AttributeId, GrantKey, GrantRecord, ScopeId, SubjectId};

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_empty());

        let mut snapshot = Snapshot::new();
        snapshot.push(
            GrantKey::new(ScopeId::new(1), SubjectId::new(2)),
            GrantRecord::new(SubjectId::new(2), AttributeId::new(3), Utc::now(), false),
        );
        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await.unwrap(), snapshot);
        assert_eq!(store.save_count(), 1);
    }
}
