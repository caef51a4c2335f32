//! JSON file implementation of the SnapshotStore trait.
//!
//! This is the primary backend. The whole document is rewritten on every
//! save; there is no append log and no partial-write protection beyond what
//! the filesystem gives.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::format::Snapshot;
use crate::traits::SnapshotStore;

/// A snapshot store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Use the file at `path`. Nothing is touched until the first call.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Snapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no grant file, starting empty");
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(e.into()),
        };

        Snapshot::from_json(&bytes)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = snapshot.to_json()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, bytes).await?;

        debug!(path = %self.path.display(), records = snapshot.len(), "stored grants");
        Ok(())
    }
}
