//! # timegrant Directory
//!
//! The outside world as the grant manager sees it: which attributes exist,
//! who holds them, and how to add, remove, create and destroy them.
//!
//! ## Overview
//!
//! The directory is an external collaborator (a chat platform's role API, an
//! identity provider, ...). This crate describes it as the [`Directory`]
//! trait and carries the notification feed that tells the manager when an
//! attribute was removed from a subject by someone else.
//!
//! ## Key Types
//!
//! - [`Directory`] - Async trait over the attribute system and subject lookup
//! - [`DirectoryEvent`] - Inbound notification
//! - [`EventSink`] / [`EventFeed`] - The two ends of the notification channel
//! - [`MemoryDirectory`] - In-memory directory for tests and demos
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timegrant_core::{ScopeId, SubjectId};
//! use timegrant_directory::{Directory, MemoryDirectory};
//!
//! async fn example() {
//!     let (directory, mut feed) = MemoryDirectory::with_events();
//!     let scope = ScopeId::new(1);
//!     let subject = directory.add_subject(SubjectId::new(7), "kim");
//!
//!     let role = directory.create_attribute(scope, "muted", None).await.unwrap();
//!     directory.add_attribute(scope, &subject, role).await.unwrap();
//!
//!     // Someone else takes it away again.
//!     directory.remove_attribute(scope, &subject, role).await.unwrap();
//!     let event = feed.next().await;
//! }
//! ```

pub mod error;
pub mod events;
pub mod memory;
pub mod traits;

pub use error::{DirectoryError, Result};
pub use events::{channel, DirectoryEvent, EventFeed, EventSink};
pub use memory::MemoryDirectory;
pub use traits::{Attribute, AttributeColor, Directory, Subject};
