//! The grant manager: unified API over index, timers, revocation and storage.
//!
//! The manager is an explicit service object. Create one per process (or per
//! test) and share it with `Arc`; nothing in this crate keeps global state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use timegrant_core::{
    parse_duration, AttributeId, GrantKey, GrantRecord, RevocationReason, ScopeId, SubjectId,
};
use timegrant_directory::Directory;
use timegrant_store::{JsonFileStore, SnapshotStore};

use crate::config::ManagerConfig;
use crate::error::{GrantError, Result};
use crate::grant::LiveGrant;
use crate::index::GrantIndex;
use crate::revocation::{RevocationEngine, RevokeOutcome};
use crate::scheduler::ExpirationScheduler;
use crate::sweeper;

/// Result of loading persisted grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records indexed and armed.
    pub loaded: usize,
    /// Records found out of date and revoked instead of indexed.
    pub stale: usize,
}

/// The main grant manager.
///
/// Provides a unified API for:
/// - Granting attributes for a limited time
/// - Loading and storing live grants
/// - Reacting to attributes removed by someone else
/// - Dropping resolved grants from memory
pub struct GrantManager<D: Directory, S: SnapshotStore> {
    /// Live grants by (scope, subject).
    index: GrantIndex,
    /// Revocation side effects and expiry timers.
    engine: Arc<RevocationEngine<D>>,
    /// Where live grants are persisted.
    store: S,
    /// Configuration.
    config: ManagerConfig,
}

impl<D: Directory + 'static> GrantManager<D, JsonFileStore> {
    /// Create a manager persisting to `config.data_path`.
    pub fn open(directory: D, config: ManagerConfig) -> Self {
        let store = JsonFileStore::new(&config.data_path);
        Self::new(directory, store, config)
    }
}

impl<D: Directory + 'static, S: SnapshotStore> GrantManager<D, S> {
    /// Create a new grant manager.
    pub fn new(directory: D, store: S, config: ManagerConfig) -> Self {
        let engine = RevocationEngine::new(
            Arc::new(directory),
            ExpirationScheduler::new(),
            config.unresolved_retry,
        );
        Self {
            index: GrantIndex::new(),
            engine: Arc::new(engine),
            store,
            config,
        }
    }

    pub fn directory(&self) -> &D {
        self.engine.directory()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Granting
    // ─────────────────────────────────────────────────────────────────────────

    /// Record that `subject` holds `attribute` for the duration written in
    /// `duration` (e.g. `1h30m`), and arm its expiry.
    ///
    /// The caller has already given the attribute to the subject. A parse
    /// error leaves the manager untouched. Returns the expiry instant.
    pub async fn grant(
        &self,
        scope: ScopeId,
        subject: SubjectId,
        attribute: AttributeId,
        duration: &str,
        ephemeral: bool,
    ) -> Result<DateTime<Utc>> {
        let seconds = parse_duration(duration)?;
        self.grant_for(scope, subject, attribute, seconds, ephemeral)
            .await
    }

    /// Like [`grant`](Self::grant), with the duration already in seconds.
    pub async fn grant_for(
        &self,
        scope: ScopeId,
        subject: SubjectId,
        attribute: AttributeId,
        seconds: u64,
        ephemeral: bool,
    ) -> Result<DateTime<Utc>> {
        let expires_at = GrantRecord::expiry_after(Utc::now(), seconds)?;
        self.grant_until(scope, subject, attribute, expires_at, ephemeral)
            .await;
        Ok(expires_at)
    }

    /// Record a grant with a known expiry instant and arm it.
    pub async fn grant_until(
        &self,
        scope: ScopeId,
        subject: SubjectId,
        attribute: AttributeId,
        expires_at: DateTime<Utc>,
        ephemeral: bool,
    ) -> Arc<LiveGrant> {
        let record = GrantRecord::new(subject, attribute, expires_at, ephemeral);
        let grant = self.index.insert(GrantKey::new(scope, subject), record);

        debug!(
            grant = %grant.id(),
            %scope,
            %subject,
            %attribute,
            %expires_at,
            ephemeral,
            "recorded grant"
        );
        self.engine.arm(&grant).await;
        grant
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation
    // ─────────────────────────────────────────────────────────────────────────

    /// End one grant now.
    pub async fn revoke(
        &self,
        grant: &LiveGrant,
        reason: RevocationReason,
    ) -> Result<RevokeOutcome> {
        self.engine.revoke(grant, reason).await
    }

    /// Someone else removed `attribute` from `subject`: cancel every live
    /// grant of that attribute, for any subject and in every scope.
    ///
    /// Returns how many grants this call resolved.
    pub async fn on_external_revocation(
        &self,
        subject: SubjectId,
        attribute: AttributeId,
    ) -> Result<usize> {
        let matching = self.index.matching(attribute);
        if !matching.is_empty() {
            debug!(%subject, %attribute, grants = matching.len(), "attribute removed externally");
        }

        let mut cancelled = 0;
        let mut first_error = None;

        for grant in matching {
            match self.engine.revoke(&grant, RevocationReason::Cancelled).await {
                Ok(outcome) if outcome.resolved() => cancelled += 1,
                Ok(_) => {}
                Err(e) => {
                    error!(grant = %grant.id(), error = %e, "failed to cancel grant");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(cancelled),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Load persisted grants into an empty manager.
    ///
    /// Every record is checked against the directory before anything is
    /// indexed, so a failing check leaves the manager empty and the load can
    /// be retried. Records whose attribute is gone, or whose subject no longer
    /// holds it, are revoked as stale and not indexed. The rest are indexed
    /// and armed; those already past due are revoked during this call.
    ///
    /// A stale record whose revocation fails is indexed and armed like a live
    /// one, so it is persisted and retried.
    pub async fn load_from_disk(&self) -> Result<LoadReport> {
        if !self.index.is_empty() {
            return Err(GrantError::InvalidOperation(
                "grants can only be loaded into an empty manager".to_string(),
            ));
        }

        let snapshot = self.store.load().await?;
        let mut checked = Vec::with_capacity(snapshot.len());
        for (key, record) in snapshot.into_records() {
            let stale = self.is_stale(key.scope, &record).await?;
            checked.push((key, record, stale));
        }

        let mut report = LoadReport::default();
        let mut armed = Vec::with_capacity(checked.len());

        for (key, record, stale) in checked {
            if !stale {
                armed.push(self.index.insert(key, record));
                continue;
            }

            let grant = self.index.detached(key, record);
            debug!(grant = %grant.id(), scope = %key.scope, subject = %key.subject, "skipped outdated grant");
            if let Err(e) = self.engine.revoke(&grant, RevocationReason::Stale).await {
                error!(grant = %grant.id(), error = %e, "failed to revoke outdated grant");
            }

            if grant.is_terminal() {
                report.stale += 1;
            } else {
                self.index.adopt(Arc::clone(&grant));
                armed.push(grant);
            }
        }

        for grant in &armed {
            self.engine.arm(grant).await;
        }
        report.loaded = armed.len();

        info!(loaded = report.loaded, stale = report.stale, "loaded grants");
        Ok(report)
    }

    /// Write every live grant, replacing the whole persisted document.
    ///
    /// Returns how many records were written.
    pub async fn store_to_disk(&self) -> Result<usize> {
        let snapshot = self.index.snapshot();
        self.store.save(&snapshot).await?;
        debug!(records = snapshot.len(), "stored grants");
        Ok(snapshot.len())
    }

    async fn is_stale(&self, scope: ScopeId, record: &GrantRecord) -> Result<bool> {
        let directory = self.engine.directory();
        if !directory.attribute_exists(record.attribute).await? {
            return Ok(true);
        }
        // A subject we cannot resolve right now is kept and retried later.
        if directory.resolve_subject(record.subject).await?.is_none() {
            return Ok(false);
        }
        let holders = directory.list_holders(scope, record.attribute).await?;
        Ok(!holders.contains(&record.subject))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Housekeeping and introspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Drop resolved grants from memory. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        sweeper::sweep(&self.index)
    }

    /// Every grant indexed for the pair, resolved ones included until swept.
    pub fn grants_for(&self, scope: ScopeId, subject: SubjectId) -> Vec<Arc<LiveGrant>> {
        self.index.bucket(scope, subject)
    }

    /// Number of grants not yet resolved.
    pub fn live_count(&self) -> usize {
        self.index.live_count()
    }

    /// Number of grants still in memory, resolved or not.
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    /// Number of expiry timers that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.engine.scheduler().pending()
    }

    /// Abort every pending expiry timer. Grants stay live and are re-armed on
    /// the next load.
    pub fn disarm(&self) {
        self.engine.scheduler().cancel_all();
    }
}

impl<D: Directory, S: SnapshotStore> std::fmt::Debug for GrantManager<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantManager")
            .field("index", &self.index)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use timegrant_core::CoreError;
    use timegrant_directory::MemoryDirectory;
    use timegrant_store::{MemorySnapshotStore, Snapshot};

    const SCOPE: ScopeId = ScopeId::new(1);
    const ALICE: SubjectId = SubjectId::new(11);
    const ROLE: AttributeId = AttributeId::new(500);

    fn directory() -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        directory.add_subject(ALICE, "alice");
        directory.insert_attribute(SCOPE, ROLE, "muted");
        directory
    }

    fn manager(
        directory: MemoryDirectory,
        store: MemorySnapshotStore,
    ) -> GrantManager<MemoryDirectory, MemorySnapshotStore> {
        GrantManager::new(directory, store, ManagerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_indexes_and_arms() {
        let manager = manager(directory(), MemorySnapshotStore::new());
        manager.directory().grant_directly(ALICE, ROLE);

        let expires_at = manager.grant(SCOPE, ALICE, ROLE, "1h", false).await.unwrap();

        assert!(expires_at > Utc::now() + ChronoDuration::minutes(59));
        assert_eq!(manager.live_count(), 1);
        assert_eq!(manager.pending_timers(), 1);
        assert_eq!(manager.grants_for(SCOPE, ALICE)[0].record().expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_grant_parse_error_mutates_nothing() {
        let manager = manager(directory(), MemorySnapshotStore::new());

        let err = manager.grant(SCOPE, ALICE, ROLE, "5m5m", false).await.unwrap_err();

        assert!(matches!(err, GrantError::Core(CoreError::Parse(_))));
        assert!(err.as_parse_error().is_some());
        assert_eq!(manager.indexed_count(), 0);
        assert_eq!(manager.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_store_skips_terminal() {
        let store = MemorySnapshotStore::new();
        let manager = manager(directory(), store);
        manager.directory().grant_directly(ALICE, ROLE);
        manager.grant(SCOPE, ALICE, ROLE, "1h", false).await.unwrap();
        manager.grant(SCOPE, ALICE, ROLE, "2h", false).await.unwrap();

        let first = manager.grants_for(SCOPE, ALICE)[0].clone();
        manager.revoke(&first, RevocationReason::Expired).await.unwrap();

        assert_eq!(manager.store_to_disk().await.unwrap(), 1);
        assert_eq!(manager.store().save_count(), 1);
    }

    #[tokio::test]
    async fn test_load_refuses_non_empty_index() {
        let manager = manager(directory(), MemorySnapshotStore::new());
        manager.directory().grant_directly(ALICE, ROLE);
        manager.grant(SCOPE, ALICE, ROLE, "1h", false).await.unwrap();

        assert!(matches!(
            manager.load_from_disk().await,
            Err(GrantError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_load_skips_stale() {
        let directory = directory();
        let mut snapshot = Snapshot::new();
        let later = Utc::now() + ChronoDuration::hours(1);
        // Alice does not hold the role any more.
        snapshot.push(
            GrantKey::new(SCOPE, ALICE),
            GrantRecord::new(ALICE, ROLE, later, false),
        );
        let manager = manager(directory, MemorySnapshotStore::with_snapshot(&snapshot).unwrap());

        let report = manager.load_from_disk().await.unwrap();

        assert_eq!(report, LoadReport { loaded: 0, stale: 1 });
        assert_eq!(manager.indexed_count(), 0);
        assert_eq!(manager.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_external_revocation_counts() {
        let manager = manager(directory(), MemorySnapshotStore::new());
        manager.directory().grant_directly(ALICE, ROLE);
        manager.grant(SCOPE, ALICE, ROLE, "1h", false).await.unwrap();

        assert_eq!(manager.on_external_revocation(ALICE, ROLE).await.unwrap(), 1);
        assert_eq!(manager.on_external_revocation(ALICE, ROLE).await.unwrap(), 0);
        assert_eq!(manager.live_count(), 0);
        assert_eq!(manager.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_disarm_keeps_grants_live() {
        let manager = manager(directory(), MemorySnapshotStore::new());
        manager.directory().grant_directly(ALICE, ROLE);
        manager.grant(SCOPE, ALICE, ROLE, "1h", false).await.unwrap();

        manager.disarm();

        assert_eq!(manager.pending_timers(), 0);
        assert_eq!(manager.live_count(), 1);
    }
}
