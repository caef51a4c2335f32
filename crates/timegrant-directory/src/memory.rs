//! In-memory implementation of the Directory trait.
//!
//! Primarily for tests. Besides the trait it offers helpers to set up
//! subjects and attributes, to act as an outside party, and to count how
//! often the grant manager performed each side effect.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use timegrant_core::{AttributeId, ScopeId, SubjectId};

use crate::error::{DirectoryError, Result};
use crate::events::{self, DirectoryEvent, EventFeed, EventSink};
use crate::traits::{Attribute, AttributeColor, Directory, Subject};

/// In-memory directory.
///
/// Thread-safe via RwLock. Every removal of a held attribute is published
/// on the event feed, including removals made through the trait.
pub struct MemoryDirectory {
    inner: RwLock<MemoryInner>,
    events: Option<EventSink>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct MemoryInner {
    subjects: HashMap<SubjectId, Subject>,
    attributes: HashMap<AttributeId, Attribute>,
    holders: HashMap<AttributeId, HashSet<SubjectId>>,
    next_attribute: u64,
    remove_calls: HashMap<(SubjectId, AttributeId), usize>,
    destroyed: Vec<AttributeId>,
}

impl MemoryDirectory {
    /// Create an empty directory that publishes no events.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                next_attribute: 1_000,
                ..MemoryInner::default()
            }),
            events: None,
            latency: None,
        }
    }

    /// Create an empty directory and the feed its events go to.
    pub fn with_events() -> (Self, EventFeed) {
        let (sink, feed) = events::channel();
        let mut directory = Self::new();
        directory.events = Some(sink);
        (directory, feed)
    }

    /// Delay every mutating call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a subject.
    pub fn add_subject(&self, id: SubjectId, name: &str) -> Subject {
        let subject = Subject {
            id,
            name: name.to_string(),
        };
        self.inner.write().subjects.insert(id, subject.clone());
        subject
    }

    /// Forget a subject, as if it left every scope.
    pub fn forget_subject(&self, id: SubjectId) {
        let mut inner = self.inner.write();
        inner.subjects.remove(&id);
        for holders in inner.holders.values_mut() {
            holders.remove(&id);
        }
    }

    /// Register an attribute with a fixed id.
    pub fn insert_attribute(&self, scope: ScopeId, id: AttributeId, name: &str) {
        let mut inner = self.inner.write();
        inner.attributes.insert(
            id,
            Attribute {
                id,
                scope,
                name: name.to_string(),
                color: None,
            },
        );
        inner.holders.entry(id).or_default();
    }

    /// Give an attribute to a subject without going through the trait.
    pub fn grant_directly(&self, subject: SubjectId, attribute: AttributeId) {
        self.inner
            .write()
            .holders
            .entry(attribute)
            .or_default()
            .insert(subject);
    }

    /// Remove an attribute from a subject as an outside party would.
    pub fn remove_externally(&self, scope: ScopeId, subject: SubjectId, attribute: AttributeId) {
        let removed = self
            .inner
            .write()
            .holders
            .get_mut(&attribute)
            .map(|h| h.remove(&subject))
            .unwrap_or(false);
        if removed {
            self.publish(scope, subject, attribute);
        }
    }

    /// Delete an attribute as an outside party would.
    pub fn delete_externally(&self, attribute: AttributeId) {
        let mut inner = self.inner.write();
        inner.attributes.remove(&attribute);
        inner.holders.remove(&attribute);
    }

    /// Whether the subject currently holds the attribute.
    pub fn holds(&self, subject: SubjectId, attribute: AttributeId) -> bool {
        self.inner
            .read()
            .holders
            .get(&attribute)
            .map_or(false, |h| h.contains(&subject))
    }

    /// Whether the attribute currently exists.
    pub fn exists(&self, attribute: AttributeId) -> bool {
        self.inner.read().attributes.contains_key(&attribute)
    }

    /// How many times `remove_attribute` was called for the pair.
    pub fn remove_calls(&self, subject: SubjectId, attribute: AttributeId) -> usize {
        self.inner
            .read()
            .remove_calls
            .get(&(subject, attribute))
            .copied()
            .unwrap_or(0)
    }

    /// Attributes destroyed through the trait, in order.
    pub fn destroyed(&self) -> Vec<AttributeId> {
        self.inner.read().destroyed.clone()
    }

    fn publish(&self, scope: ScopeId, subject: SubjectId, attribute: AttributeId) {
        if let Some(sink) = &self.events {
            sink.emit(DirectoryEvent::AttributeRemoved {
                scope,
                subject,
                attribute,
            });
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn attribute_exists(&self, attribute: AttributeId) -> Result<bool> {
        Ok(self.exists(attribute))
    }

    async fn resolve_subject(&self, subject: SubjectId) -> Result<Option<Subject>> {
        Ok(self.inner.read().subjects.get(&subject).cloned())
    }

    async fn add_attribute(
        &self,
        _scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.inner.write();
        if !inner.attributes.contains_key(&attribute) {
            return Err(DirectoryError::AttributeNotFound(attribute));
        }
        if !inner.subjects.contains_key(&subject.id) {
            return Err(DirectoryError::SubjectNotFound(subject.id));
        }
        inner.holders.entry(attribute).or_default().insert(subject.id);
        Ok(())
    }

    async fn remove_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()> {
        self.simulate_latency().await;
        let removed = {
            let mut inner = self.inner.write();
            *inner.remove_calls.entry((subject.id, attribute)).or_default() += 1;
            if !inner.attributes.contains_key(&attribute) {
                return Err(DirectoryError::AttributeNotFound(attribute));
            }
            inner
                .holders
                .get_mut(&attribute)
                .map(|h| h.remove(&subject.id))
                .unwrap_or(false)
        };
        if removed {
            self.publish(scope, subject.id, attribute);
        }
        Ok(())
    }

    async fn destroy_attribute(&self, attribute: AttributeId) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.inner.write();
        if inner.attributes.remove(&attribute).is_none() {
            return Err(DirectoryError::AttributeNotFound(attribute));
        }
        inner.holders.remove(&attribute);
        inner.destroyed.push(attribute);
        Ok(())
    }

    async fn create_attribute(
        &self,
        scope: ScopeId,
        name: &str,
        color: Option<AttributeColor>,
    ) -> Result<AttributeId> {
        self.simulate_latency().await;
        let mut inner = self.inner.write();
        inner.next_attribute += 1;
        let id = AttributeId::new(inner.next_attribute);
        inner.attributes.insert(
            id,
            Attribute {
                id,
                scope,
                name: name.to_string(),
                color,
            },
        );
        inner.holders.insert(id, HashSet::new());
        Ok(id)
    }

    async fn list_holders(
        &self,
        scope: ScopeId,
        attribute: AttributeId,
    ) -> Result<HashSet<SubjectId>> {
        let inner = self.inner.read();
        let in_scope = inner
            .attributes
            .get(&attribute)
            .map_or(false, |a| a.scope == scope);
        if !in_scope {
            return Ok(HashSet::new());
        }
        Ok(inner.holders.get(&attribute).cloned().unwrap_or_default())
    }

    async fn list_attributes(&self, scope: ScopeId) -> Result<Vec<Attribute>> {
        let inner = self.inner.read();
        let mut attributes: Vec<Attribute> = inner
            .attributes
            .values()
            .filter(|a| a.scope == scope)
            .cloned()
            .collect();
        attributes.sort_by_key(|a| a.id);
        Ok(attributes)
    }
}
