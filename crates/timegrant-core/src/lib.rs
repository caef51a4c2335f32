//! # timegrant Core
//!
//! Pure primitives for timegrant: identifiers, grant records, and the
//! compact duration syntax used to request them.
//!
//! This crate contains no I/O, no timers, no storage. It is pure computation
//! over the data the rest of the workspace passes around.
//!
//! ## Key Types
//!
//! - [`ScopeId`], [`SubjectId`], [`AttributeId`] - Opaque numeric identities
//! - [`GrantKey`] - The (scope, subject) pair the grant index is keyed by
//! - [`GrantRecord`] - One subject/attribute/expiry triple
//! - [`RevocationReason`] - Why a grant ended
//!
//! ## Durations
//!
//! Durations are written as `3d7h13m45s`. A bare number means minutes.
//! See the [`duration`] module.

pub mod duration;
pub mod error;
pub mod record;
pub mod types;

pub use duration::{parse_duration, DurationField};
pub use error::{CoreError, ParseError};
pub use record::{GrantRecord, RevocationReason};
pub use types::{AttributeId, GrantKey, ScopeId, SubjectId};
