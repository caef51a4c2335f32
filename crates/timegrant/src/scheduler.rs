//! Expiration scheduler.
//!
//! One tokio task per armed grant. The task sleeps until the grant's expiry
//! and then hands the grant to a callback. Tasks only hold a `Weak` reference,
//! so a grant that has left the index is never kept alive by its timer.
//!
//! A timer task removes its own pending entry before firing. [`cancel`]
//! therefore only ever aborts tasks that are still asleep, never one that is
//! already running a revocation.
//!
//! [`cancel`]: ExpirationScheduler::cancel

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::AbortHandle;

use crate::grant::{GrantId, LiveGrant};

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

/// Pending expiry timers, keyed by grant.
#[derive(Clone, Default)]
pub struct ExpirationScheduler {
    pending: Arc<DashMap<GrantId, Timer>>,
    generations: Arc<AtomicU64>,
}

impl ExpirationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `fire` with `grant` once `delay` has passed, unless cancelled.
    ///
    /// Re-arming a grant replaces its previous timer.
    pub fn schedule<F, Fut>(&self, grant: &Arc<LiveGrant>, delay: Duration, fire: F)
    where
        F: FnOnce(Arc<LiveGrant>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = grant.id();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<LiveGrant> = Arc::downgrade(grant);
        let pending = Arc::clone(&self.pending);

        // The entry stays locked until the handle is stored, so the task
        // cannot look for its entry before it exists.
        let entry = self.pending.entry(id);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let ours = pending
                .remove_if(&id, |_, timer| timer.generation == generation)
                .is_some();
            if !ours {
                return;
            }
            if let Some(grant) = weak.upgrade() {
                fire(grant).await;
            }
        });

        let timer = Timer {
            generation,
            handle: task.abort_handle(),
        };
        match entry {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(timer);
                previous.handle.abort();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(timer);
            }
        }
    }

    /// Abort the grant's timer if it has not fired yet.
    ///
    /// Returns `true` if a pending timer was cancelled.
    pub fn cancel(&self, id: GrantId) -> bool {
        match self.pending.remove(&id) {
            Some((_, timer)) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending timer.
    pub fn cancel_all(&self) {
        self.pending.retain(|_, timer| {
            timer.handle.abort();
            false
        });
    }

    /// Whether the grant has a timer that has not fired yet.
    pub fn is_pending(&self, id: GrantId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for ExpirationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationScheduler")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::GrantIndex;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use timegrant_core::{AttributeId, GrantKey, GrantRecord, ScopeId, SubjectId};

    fn grant(index: &GrantIndex) -> Arc<LiveGrant> {
        let subject = SubjectId::new(1);
        index.insert(
            GrantKey::new(ScopeId::new(1), subject),
            GrantRecord::new(subject, AttributeId::new(2), Utc::now(), false),
        )
    }

    fn counter(
        fired: &Arc<AtomicUsize>,
    ) -> impl FnOnce(Arc<LiveGrant>) -> std::future::Ready<()> + Send + 'static {
        let fired = Arc::clone(fired);
        move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let index = GrantIndex::new();
        let grant = grant(&index);
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(&grant, Duration::from_secs(60), counter(&fired));
        assert!(scheduler.is_pending(grant.id()));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let index = GrantIndex::new();
        let grant = grant(&index);
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(&grant, Duration::from_secs(60), counter(&fired));
        assert!(scheduler.cancel(grant.id()));
        assert!(!scheduler.cancel(grant.id()));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_timer() {
        let index = GrantIndex::new();
        let grant = grant(&index);
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(&grant, Duration::from_secs(10), counter(&fired));
        scheduler.schedule(&grant, Duration::from_secs(60), counter(&fired));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_grant_does_not_fire() {
        let index = GrantIndex::new();
        let grant = index.detached(
            GrantKey::new(ScopeId::new(1), SubjectId::new(1)),
            GrantRecord::new(SubjectId::new(1), AttributeId::new(2), Utc::now(), false),
        );
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(&grant, Duration::from_secs(5), counter(&fired));
        drop(grant);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let index = GrantIndex::new();
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            scheduler.schedule(&grant(&index), Duration::from_secs(5), counter(&fired));
        }
        assert_eq!(scheduler.pending(), 3);

        scheduler.cancel_all();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
