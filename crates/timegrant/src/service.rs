//! Service lifecycle: startup load, periodic tasks, orderly shutdown.
//!
//! ## Background tasks
//!
//! | Task        | Period              | Work                          |
//! |-------------|---------------------|-------------------------------|
//! | persistence | `persist_interval`  | [`GrantManager::store_to_disk`] |
//! | sweeper     | `sweep_interval`    | [`GrantManager::sweep`]         |
//! | bridge      | event driven        | [`GrantManager::on_external_revocation`] |
//!
//! The first periodic tick happens one full period after start. Shutdown
//! stops all three, then sweeps and stores once more.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use timegrant_directory::{Directory, EventFeed};
use timegrant_store::SnapshotStore;

use crate::bridge;
use crate::error::Result;
use crate::manager::{GrantManager, LoadReport};

/// A running grant manager with its background tasks.
pub struct GrantService<D: Directory, S: SnapshotStore> {
    manager: Arc<GrantManager<D, S>>,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    loaded: LoadReport,
}

impl<D, S> GrantService<D, S>
where
    D: Directory + 'static,
    S: SnapshotStore + 'static,
{
    /// Load persisted grants and start the background tasks.
    ///
    /// Without a `feed`, external removals are not observed.
    pub async fn start(manager: Arc<GrantManager<D, S>>, feed: Option<EventFeed>) -> Result<Self> {
        let loaded = manager.load_from_disk().await?;
        let (stop, stop_rx) = watch::channel(false);
        let config = manager.config().clone();

        let mut tasks = Vec::with_capacity(3);

        let persist = Arc::clone(&manager);
        tasks.push(spawn_periodic(
            "persistence",
            config.persist_interval,
            stop_rx.clone(),
            move || {
                let manager = Arc::clone(&persist);
                async move {
                    if let Err(e) = manager.store_to_disk().await {
                        error!(error = %e, "periodic persistence failed");
                    }
                }
            },
        ));

        let sweep = Arc::clone(&manager);
        tasks.push(spawn_periodic(
            "sweeper",
            config.sweep_interval,
            stop_rx.clone(),
            move || {
                sweep.sweep();
                std::future::ready(())
            },
        ));

        if let Some(feed) = feed {
            tasks.push(tokio::spawn(bridge::run(
                Arc::clone(&manager),
                feed,
                stop_rx,
            )));
        }

        info!(
            loaded = loaded.loaded,
            stale = loaded.stale,
            persist_interval = ?config.persist_interval,
            sweep_interval = ?config.sweep_interval,
            "grant service started"
        );

        Ok(Self {
            manager,
            stop,
            tasks,
            loaded,
        })
    }

    pub fn manager(&self) -> &Arc<GrantManager<D, S>> {
        &self.manager
    }

    /// What the startup load found.
    pub fn loaded(&self) -> &LoadReport {
        &self.loaded
    }

    /// Stop the background tasks, sweep, and store one last time.
    ///
    /// Pending expiry timers keep running; the grants they belong to are in
    /// the stored document either way.
    pub async fn shutdown(self) -> Result<usize> {
        let _ = self.stop.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "background task ended abnormally");
            }
        }

        self.manager.sweep();
        let stored = self.manager.store_to_disk().await?;
        info!(stored, "grant service stopped");
        Ok(stored)
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stop: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(task = name, "periodic tick");
                    tick().await;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(task = name, "periodic task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use timegrant_core::{AttributeId, ScopeId, SubjectId};
    use timegrant_directory::MemoryDirectory;
    use timegrant_store::MemorySnapshotStore;

    fn manager(
        persist: Duration,
    ) -> Arc<GrantManager<MemoryDirectory, MemorySnapshotStore>> {
        let directory = MemoryDirectory::new();
        directory.add_subject(SubjectId::new(2), "alice");
        directory.insert_attribute(ScopeId::new(1), AttributeId::new(3), "muted");
        directory.grant_directly(SubjectId::new(2), AttributeId::new(3));
        Arc::new(GrantManager::new(
            directory,
            MemorySnapshotStore::new(),
            ManagerConfig::default().with_persist_interval(persist),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_persists_periodically() {
        let manager = manager(Duration::from_secs(300));
        let service = GrantService::start(Arc::clone(&manager), None).await.unwrap();

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(manager.store().save_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(manager.store().save_count(), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(manager.store().save_count(), 2);

        service.shutdown().await.unwrap();
        assert_eq!(manager.store().save_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_sweeps_then_stores() {
        let manager = manager(Duration::from_secs(300));
        let service = GrantService::start(Arc::clone(&manager), None).await.unwrap();
        let (scope, alice, role) = (ScopeId::new(1), SubjectId::new(2), AttributeId::new(3));

        manager.grant(scope, alice, role, "1h", false).await.unwrap();
        manager.grant(scope, alice, role, "2h", false).await.unwrap();
        manager.on_external_revocation(alice, role).await.unwrap();
        manager.directory().grant_directly(alice, role);
        manager.grant(scope, alice, role, "3h", false).await.unwrap();
        assert_eq!(manager.indexed_count(), 3);

        let stored = service.shutdown().await.unwrap();

        assert_eq!(stored, 1);
        assert_eq!(manager.indexed_count(), 1);
    }
}
