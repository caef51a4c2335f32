//! # timegrant
//!
//! Time-bounded grants: give a subject an attribute (a role, a permission)
//! until a fixed instant, and take it away again automatically.
//!
//! ## Overview
//!
//! The grant manager keeps every live grant in memory, arms one expiry timer
//! per grant, and persists the live set to a JSON document so that grants
//! survive restarts. It revokes grants when:
//!
//! - **Expired**: the expiry instant is reached
//! - **Cancelled**: someone else removed the attribute first
//! - **Stale**: the persisted record no longer matches the directory on load
//!
//! Attributes created just for a grant ("ephemeral") are deleted once nobody
//! in the scope holds them any more.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timegrant::{GrantManager, GrantService, ManagerConfig};
//! use timegrant::core::{AttributeId, ScopeId, SubjectId};
//! use timegrant::directory::MemoryDirectory;
//!
//! async fn example() {
//!     let (directory, feed) = MemoryDirectory::with_events();
//!     let manager = Arc::new(GrantManager::open(directory, ManagerConfig::default()));
//!
//!     // Load persisted grants and start persistence, sweeping and the
//!     // external event bridge.
//!     let service = GrantService::start(Arc::clone(&manager), Some(feed))
//!         .await
//!         .unwrap();
//!
//!     // The caller gives the attribute, the manager takes it away again.
//!     manager
//!         .grant(ScopeId::new(1), SubjectId::new(2), AttributeId::new(3), "1h30m", false)
//!         .await
//!         .unwrap();
//!
//!     service.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `timegrant::core` - Identifiers, records, duration parsing
//! - `timegrant::store` - Snapshot persistence
//! - `timegrant::directory` - The directory trait and its in-memory version

pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod grant;
pub mod index;
pub mod manager;
pub mod revocation;
pub mod scheduler;
pub mod service;
pub mod sweeper;

// Re-export component crates
pub use timegrant_core as core;
pub use timegrant_directory as directory;
pub use timegrant_store as store;

// Re-export main types for convenience
pub use commands::{assign_new, temp_role, CommandReply, ReplyStatus, RoleQuery};
pub use config::ManagerConfig;
pub use error::{GrantError, Result};
pub use grant::{GrantId, LiveGrant};
pub use manager::{GrantManager, LoadReport};
pub use revocation::{RevocationEngine, RevokeOutcome};
pub use scheduler::ExpirationScheduler;
pub use service::GrantService;

// Re-export commonly used core types
pub use timegrant_core::{
    parse_duration, AttributeId, GrantKey, GrantRecord, RevocationReason, ScopeId, SubjectId,
};
