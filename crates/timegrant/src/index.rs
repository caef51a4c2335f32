//! The grant index: every live grant, bucketed by (scope, subject).
//!
//! Backed by a sharded concurrent map. Every mutation of a bucket happens
//! under that bucket's shard lock, so inserts and sweeps on the same key
//! never interleave. Nothing here awaits; callers clone the `Arc`s they
//! need and release the map before doing any I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use timegrant_core::{AttributeId, GrantKey, GrantRecord, ScopeId, SubjectId};
use timegrant_store::Snapshot;

use crate::grant::{GrantId, LiveGrant};

/// Concurrent (scope, subject) -> grants map.
#[derive(Debug, Default)]
pub struct GrantIndex {
    buckets: DashMap<GrantKey, Vec<Arc<LiveGrant>>>,
    next_id: AtomicU64,
}

impl GrantIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a record as a new live grant without indexing it.
    pub fn detached(&self, key: GrantKey, record: GrantRecord) -> Arc<LiveGrant> {
        let id = GrantId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        Arc::new(LiveGrant::new(id, key, record))
    }

    /// Index a record and return its live grant.
    pub fn insert(&self, key: GrantKey, record: GrantRecord) -> Arc<LiveGrant> {
        let grant = self.detached(key, record);
        self.adopt(Arc::clone(&grant));
        grant
    }

    /// Index a grant made with [`detached`](Self::detached).
    pub fn adopt(&self, grant: Arc<LiveGrant>) {
        self.buckets.entry(grant.key()).or_default().push(grant);
    }

    /// All grants in one bucket, terminal ones included.
    pub fn bucket(&self, scope: ScopeId, subject: SubjectId) -> Vec<Arc<LiveGrant>> {
        self.buckets
            .get(&GrantKey::new(scope, subject))
            .map(|bucket| bucket.clone())
            .unwrap_or_default()
    }

    /// Non-terminal grants of `attribute`, for any subject in any scope.
    pub fn matching(&self, attribute: AttributeId) -> Vec<Arc<LiveGrant>> {
        self.buckets
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|g| !g.is_terminal() && g.record().attribute == attribute)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Every non-terminal record, grouped for persistence.
    pub fn snapshot(&self) -> Snapshot {
        self.buckets
            .iter()
            .flat_map(|entry| {
                let key = *entry.key();
                entry
                    .value()
                    .iter()
                    .filter(|g| !g.is_terminal())
                    .map(|g| (key, g.record().clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Drop terminal grants and empty buckets. Returns how many grants went.
    pub fn remove_terminal(&self) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|g| !g.is_terminal());
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }

    /// Number of grants still in the index, terminal or not.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of non-terminal grants.
    pub fn live_count(&self) -> usize {
        self.buckets
            .iter()
            .map(|entry| entry.value().iter().filter(|g| !g.is_terminal()).count())
            .sum()
    }
}
