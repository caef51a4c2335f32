//! Event bridge: turns directory notifications into grant cancellations.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error};

use timegrant_directory::{Directory, DirectoryEvent, EventFeed};
use timegrant_store::SnapshotStore;

use crate::manager::GrantManager;

/// Consume `feed` until it closes or `stop` flips to `true`.
///
/// Every `AttributeRemoved` event cancels the manager's live grants for that
/// attribute. Each event is handled on its own task, so a slow directory call
/// does not hold up later events. Removals the manager made itself come back
/// through the feed as well; by then the grant is terminal and the event is
/// a no-op. Handlers still running when the loop ends are awaited.
pub async fn run<D, S>(
    manager: Arc<GrantManager<D, S>>,
    mut feed: EventFeed,
    mut stop: watch::Receiver<bool>,
) where
    D: Directory + 'static,
    S: SnapshotStore + 'static,
{
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            event = feed.next() => match event {
                Some(event) => {
                    handlers.spawn(handle(Arc::clone(&manager), event));
                }
                None => {
                    debug!("directory feed closed");
                    break;
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "removal handler panicked");
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }

    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "removal handler panicked");
        }
    }
}

async fn handle<D, S>(manager: Arc<GrantManager<D, S>>, event: DirectoryEvent)
where
    D: Directory + 'static,
    S: SnapshotStore,
{
    match event {
        DirectoryEvent::AttributeRemoved {
            scope,
            subject,
            attribute,
        } => match manager.on_external_revocation(subject, attribute).await {
            Ok(0) => {}
            Ok(cancelled) => debug!(%scope, %subject, %attribute, cancelled, "cancelled grants"),
            Err(e) => error!(%scope, %subject, %attribute, error = %e, "failed to handle removal"),
        },
    }
}
