//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use timegrant::{GrantManager, ManagerConfig};
use timegrant_core::{AttributeId, ScopeId, SubjectId};
use timegrant_directory::{EventFeed, MemoryDirectory};
use timegrant_store::JsonFileStore;

pub const SCOPE: ScopeId = ScopeId::new(100);
pub const OTHER_SCOPE: ScopeId = ScopeId::new(200);

pub const ALICE: SubjectId = SubjectId::new(1001);
pub const BOB: SubjectId = SubjectId::new(1002);

/// Attribute in [`SCOPE`].
pub const MUTED: AttributeId = AttributeId::new(501);
/// Attribute in [`SCOPE`].
pub const VIP: AttributeId = AttributeId::new(502);
/// Attribute in [`OTHER_SCOPE`].
pub const GUEST: AttributeId = AttributeId::new(601);

/// Manager over a shared in-memory directory and a JSON file.
pub type TestManager = GrantManager<Arc<MemoryDirectory>, JsonFileStore>;

/// A directory with two subjects and three attributes, nobody holding any.
pub fn populated_directory() -> (MemoryDirectory, EventFeed) {
    let (directory, feed) = MemoryDirectory::with_events();
    directory.add_subject(ALICE, "alice");
    directory.add_subject(BOB, "bob");
    directory.insert_attribute(SCOPE, MUTED, "Muted");
    directory.insert_attribute(SCOPE, VIP, "VIP");
    directory.insert_attribute(OTHER_SCOPE, GUEST, "Guest");
    (directory, feed)
}

/// A populated directory plus a state file in a temporary directory.
///
/// Every call to [`manager`](Self::manager) builds a fresh manager over the
/// same directory and state file, which is how tests simulate a restart.
pub struct TestFixture {
    pub directory: Arc<MemoryDirectory>,
    pub config: ManagerConfig,
    feed: Option<EventFeed>,
    _dir: TempDir,
}

impl TestFixture {
    /// Create a fixture with default timings and the retry policy disabled.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let (directory, feed) = populated_directory();
        let config = ManagerConfig::default()
            .with_data_path(dir.path().join("data").join("timed.json"))
            .with_unresolved_retry(None);

        Self {
            directory: Arc::new(directory),
            config,
            feed: Some(feed),
            _dir: dir,
        }
    }

    /// Adjust the configuration used by managers built afterwards.
    pub fn configure(mut self, f: impl FnOnce(ManagerConfig) -> ManagerConfig) -> Self {
        self.config = f(self.config);
        self
    }

    /// Build a new manager over the shared directory and state file.
    pub fn manager(&self) -> Arc<TestManager> {
        Arc::new(GrantManager::open(
            Arc::clone(&self.directory),
            self.config.clone(),
        ))
    }

    /// Take the directory's event feed. Only the first call gets it.
    pub fn take_feed(&mut self) -> Option<EventFeed> {
        self.feed.take()
    }

    pub fn data_path(&self) -> &Path {
        &self.config.data_path
    }

    /// Replace the state file with `json`.
    pub fn write_state(&self, json: &str) -> io::Result<()> {
        if let Some(parent) = self.data_path().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(self.data_path(), json)
    }

    /// Read the state file.
    pub fn read_state(&self) -> io::Result<String> {
        fs::read_to_string(self.data_path())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
