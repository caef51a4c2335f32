//! Directory trait and the entities it hands out.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use timegrant_core::{AttributeId, ScopeId, SubjectId};

use crate::error::{DirectoryError, Result};

/// A resolved subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

/// An attribute as the directory knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub id: AttributeId,
    pub scope: ScopeId,
    pub name: String,
    pub color: Option<AttributeColor>,
}

/// 24-bit RGB color of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeColor(pub u32);

impl AttributeColor {
    /// Parse up to six hex digits, e.g. `ff8800` or `fff` (= `000fff`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim();
        if digits.is_empty() || digits.len() > 6 {
            return Err(DirectoryError::InvalidColor(s.to_string()));
        }

        let mut rgb = [0u8; 3];
        hex::decode_to_slice(format!("{digits:0>6}"), &mut rgb)
            .map_err(|_| DirectoryError::InvalidColor(s.to_string()))?;

        Ok(Self(u32::from_be_bytes([0, rgb[0], rgb[1], rgb[2]])))
    }

    /// Red, green and blue components.
    pub fn rgb(self) -> [u8; 3] {
        let [_, r, g, b] = self.0.to_be_bytes();
        [r, g, b]
    }
}

impl fmt::Display for AttributeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode(self.rgb()))
    }
}

impl FromStr for AttributeColor {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// The attribute system and subject lookup the grant manager drives.
///
/// All calls are awaited to completion; implementations must not time out
/// on their own.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether the attribute still exists anywhere.
    async fn attribute_exists(&self, attribute: AttributeId) -> Result<bool>;

    /// Look up a subject. `None` if it can no longer be resolved.
    async fn resolve_subject(&self, subject: SubjectId) -> Result<Option<Subject>>;

    /// Give the attribute to the subject.
    async fn add_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()>;

    /// Take the attribute away from the subject. Succeeds if it was not held.
    async fn remove_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()>;

    /// Delete the attribute itself.
    async fn destroy_attribute(&self, attribute: AttributeId) -> Result<()>;

    /// Create a new attribute in `scope`.
    async fn create_attribute(
        &self,
        scope: ScopeId,
        name: &str,
        color: Option<AttributeColor>,
    ) -> Result<AttributeId>;

    /// Every subject in `scope` currently holding the attribute.
    async fn list_holders(&self, scope: ScopeId, attribute: AttributeId)
        -> Result<HashSet<SubjectId>>;

    /// Every attribute defined in `scope`.
    async fn list_attributes(&self, scope: ScopeId) -> Result<Vec<Attribute>>;
}

#[async_trait]
impl<T: Directory + ?Sized> Directory for Arc<T> {
    async fn attribute_exists(&self, attribute: AttributeId) -> Result<bool> {
        (**self).attribute_exists(attribute).await
    }

    async fn resolve_subject(&self, subject: SubjectId) -> Result<Option<Subject>> {
        (**self).resolve_subject(subject).await
    }

    async fn add_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()> {
        (**self).add_attribute(scope, subject, attribute).await
    }

    async fn remove_attribute(
        &self,
        scope: ScopeId,
        subject: &Subject,
        attribute: AttributeId,
    ) -> Result<()> {
        (**self).remove_attribute(scope, subject, attribute).await
    }

    async fn destroy_attribute(&self, attribute: AttributeId) -> Result<()> {
        (**self).destroy_attribute(attribute).await
    }

    async fn create_attribute(
        &self,
        scope: ScopeId,
        name: &str,
        color: Option<AttributeColor>,
    ) -> Result<AttributeId> {
        (**self).create_attribute(scope, name, color).await
    }

    async fn list_holders(
        &self,
        scope: ScopeId,
        attribute: AttributeId,
    ) -> Result<HashSet<SubjectId>> {
        (**self).list_holders(scope, attribute).await
    }

    async fn list_attributes(&self, scope: ScopeId) -> Result<Vec<Attribute>> {
        (**self).list_attributes(scope).await
    }
}
