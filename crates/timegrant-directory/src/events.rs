//! Notification feed from the directory.
//!
//! The directory pushes an event whenever an attribute is taken away from a
//! subject, no matter who did it. The grant manager consumes the feed and
//! cancels every pending grant of that attribute.

use tokio::sync::mpsc;

use timegrant_core::{AttributeId, ScopeId, SubjectId};

/// Inbound notification from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// `attribute` is no longer held by `subject`.
    AttributeRemoved {
        scope: ScopeId,
        subject: SubjectId,
        attribute: AttributeId,
    },
}

/// Create a connected sink/feed pair.
///
/// The channel is unbounded: the consumer may itself cause removals (and
/// therefore events) while handling one.
pub fn channel() -> (EventSink, EventFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventFeed { rx })
}

/// Sending half, held by whatever watches the directory.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DirectoryEvent>,
}

impl EventSink {
    /// Push an event. Returns `false` once the feed has been dropped.
    pub fn emit(&self, event: DirectoryEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Receiving half, consumed by the grant manager.
#[derive(Debug)]
pub struct EventFeed {
    rx: mpsc::UnboundedReceiver<DirectoryEvent>,
}

impl EventFeed {
    /// Wait for the next event. `None` once every sink is gone.
    pub async fn next(&mut self) -> Option<DirectoryEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is queued, without waiting.
    pub fn try_next(&mut self) -> Option<DirectoryEvent> {
        self.rx.try_recv().ok()
    }
}
