//! # timegrant Store
//!
//! Persistence for grant records. Provides a trait-based interface for
//! loading and saving the full set of live grants, with a JSON file
//! implementation and an in-memory one.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`SnapshotStore`]
//! trait, so the grant manager does not care where its state lives. The
//! primary implementation is [`JsonFileStore`], with [`MemorySnapshotStore`]
//! for testing.
//!
//! ## Key Types
//!
//! - [`SnapshotStore`] - The async trait for loading and saving state
//! - [`Snapshot`] - Every live record, grouped by (scope, subject)
//! - [`JsonFileStore`] - One JSON document on disk, rewritten on every save
//! - [`MemorySnapshotStore`] - Keeps the encoded document in memory
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timegrant_store::{JsonFileStore, Snapshot, SnapshotStore};
//!
//! async fn example() {
//!     let store = JsonFileStore::new("data/timed.json");
//!
//!     // A missing file loads as an empty snapshot.
//!     let snapshot = store.load().await.unwrap();
//!
//!     store.save(&snapshot).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Full rewrite**: every save replaces the whole document
//! - **Missing file**: treated as "no prior state", not an error
//! - **Instants**: always written as RFC 3339 in UTC with a `Z` suffix

pub mod error;
pub mod file;
pub mod format;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::JsonFileStore;
pub use format::Snapshot;
pub use memory::MemorySnapshotStore;
pub use traits::SnapshotStore;
