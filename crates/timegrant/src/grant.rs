//! Live grants: a persisted record plus its in-memory lifecycle.
//!
//! A [`LiveGrant`] is created once per record and shared by `Arc` between
//! the index, the revocation path and (weakly) its expiry timer. Its
//! `terminal` flag only ever goes from `false` to `true`, and only while
//! the grant's revocation lock is held.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tokio::sync::{Mutex, MutexGuard};

use timegrant_core::{GrantKey, GrantRecord, RevocationReason};

/// Process-local identity of a live grant.
///
/// Two records with identical fields are still distinct grants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrantId(u64);

impl GrantId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw sequence number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantId({})", self.0)
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A grant record being tracked by the manager.
pub struct LiveGrant {
    id: GrantId,
    key: GrantKey,
    record: GrantRecord,
    terminal: AtomicBool,
    reason: OnceLock<RevocationReason>,
    revocation: Mutex<()>,
}

impl LiveGrant {
    pub(crate) fn new(id: GrantId, key: GrantKey, record: GrantRecord) -> Self {
        Self {
            id,
            key,
            record,
            terminal: AtomicBool::new(false),
            reason: OnceLock::new(),
            revocation: Mutex::new(()),
        }
    }

    pub fn id(&self) -> GrantId {
        self.id
    }

    /// The (scope, subject) bucket this grant lives in.
    pub fn key(&self) -> GrantKey {
        self.key
    }

    pub fn record(&self) -> &GrantRecord {
        &self.record
    }

    /// Whether the grant has been fully resolved.
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Why the grant ended, once it has.
    pub fn reason(&self) -> Option<RevocationReason> {
        self.reason.get().copied()
    }

    /// Enter the per-grant critical section.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.revocation.lock().await
    }

    /// Mark the grant resolved. Callers hold the revocation lock.
    pub(crate) fn finish(&self, reason: RevocationReason) {
        let _ = self.reason.set(reason);
        self.terminal.store(true, Ordering::Release);
    }
}

impl fmt::Debug for LiveGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveGrant")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("record", &self.record)
            .field("terminal", &self.is_terminal())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use timegrant_core::{AttributeId, ScopeId, SubjectId};

    fn grant() -> LiveGrant {
        let subject = SubjectId::new(2);
        LiveGrant::new(
            GrantId::new(1),
            GrantKey::new(ScopeId::new(1), subject),
            GrantRecord::new(subject, AttributeId::new(3), Utc::now(), false),
        )
    }

    #[test]
    fn test_starts_live() {
        let grant = grant();
        assert!(!grant.is_terminal());
        assert_eq!(grant.reason(), None);
    }

    #[test]
    fn test_first_reason_wins() {
        let grant = grant();
        grant.finish(RevocationReason::Cancelled);
        grant.finish(RevocationReason::Expired);

        assert!(grant.is_terminal());
        assert_eq!(grant.reason(), Some(RevocationReason::Cancelled));
    }

    #[test]
    fn test_grant_id_display() {
        assert_eq!(GrantId::new(42).to_string(), "#42");
        assert_eq!(format!("{:?}", GrantId::new(42)), "GrantId(42)");
    }
}
