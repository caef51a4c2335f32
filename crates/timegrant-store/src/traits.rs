//! SnapshotStore trait: the abstract interface for grant persistence.
//!
//! This trait allows the grant manager to be storage-agnostic.
//! Implementations include a JSON file (primary) and in-memory (for tests).

use async_trait::async_trait;

use crate::error::Result;
use crate::format::Snapshot;

/// Async interface for loading and saving the full set of live grants.
///
/// # Design Notes
///
/// - **Whole-state**: there are no partial updates; `save` replaces what
///   `load` would return.
/// - **Missing state**: a store that has never been written loads as an
///   empty [`Snapshot`].
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the last saved snapshot.
    async fn load(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}
