//! Fault injection for directory calls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use timegrant_core::{AttributeId, ScopeId, SubjectId};
use timegrant_directory::{
    Attribute, AttributeColor, Directory, DirectoryError, Result, Subject,
};

/// Switches for [`FaultyDirectory`]. All off by default.
#[derive(Debug, Default)]
pub struct Faults {
    remove: AtomicBool,
    holders: AtomicBool,
}

impl Faults {
    /// Make `remove_attribute` fail.
    pub fn fail_removals(&self, on: bool) {
        self.remove.store(on, Ordering::SeqCst);
    }

    /// Make `list_holders` fail.
    pub fn fail_holder_listing(&self, on: bool) {
        self.holders.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DirectoryError::Backend(format!("injected {what} failure")));
        }
        Ok(())
    }
}

/// Wraps a directory and fails selected calls on demand.
pub struct FaultyDirectory<D> {
    inner: D,
    faults: Arc<Faults>,
}

impl<D: Directory> FaultyDirectory<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Shared handle to the switches.
    pub fn faults(&self) -> Arc<Faults> {
        Arc::clone(&self.faults)
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: Directory> Directory for FaultyDirectory<D> {
    async fn attribute_exists(&self, attribute: AttributeId) -> Result<bool> {
        self.inner.attribute_exists(attribute).await
    }

    async fn resolve_subject(&self, subject: SubjectId) -> Result<Option<Subject>> {
        self.inner.resolve_subject(subject).await
    }

    async fn add_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()> {
        self.inner.add_attribute(scope, subject, attribute).await
    }

    async fn remove_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()> {
        Faults::check(&self.faults.remove, "removal")?;
        self.inner.remove_attribute(scope, subject, attribute).await
    }

    async fn destroy_attribute(&self, attribute: AttributeId) -> Result<()> {
        self.inner.destroy_attribute(attribute).await
    }

    async fn create_attribute(
        &self,
        scope: ScopeId,
        name: &str,
        color: Option<AttributeColor>,
    ) -> Result<AttributeId> {
        self.inner.create_attribute(scope, name, color).await
    }

    async fn list_holders(
        &self,
        scope: ScopeId,
        attribute: AttributeId,
    ) -> Result<HashSet<SubjectId>> {
        Faults::check(&self.faults.holders, "holder listing")?;
        self.inner.list_holders(scope, attribute).await
    }

    async fn list_attributes(&self, scope: ScopeId) -> Result<Vec<Attribute>> {
        self.inner.list_attributes(scope).await
    }
}
