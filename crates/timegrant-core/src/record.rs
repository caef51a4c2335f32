//! Grant records.
//!
//! A grant record is the durable unit of state: one attribute held by one
//! subject until a fixed instant. Records are never renewed; a longer grant
//! is a new record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::duration::parse_duration;
use crate::error::CoreError;
use crate::types::{AttributeId, SubjectId};

/// One subject/attribute/expiry triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Who holds the attribute.
    pub subject: SubjectId,

    /// What is held.
    pub attribute: AttributeId,

    /// When the grant ends.
    pub expires_at: DateTime<Utc>,

    /// The attribute was created for this grant and is destroyed once
    /// nobody holds it.
    pub ephemeral: bool,
}

impl GrantRecord {
    /// Create a record with a known expiry.
    pub fn new(
        subject: SubjectId,
        attribute: AttributeId,
        expires_at: DateTime<Utc>,
        ephemeral: bool,
    ) -> Self {
        Self {
            subject,
            attribute,
            expires_at,
            ephemeral,
        }
    }

    /// Create a record that expires `seconds` after `now`.
    pub fn lasting(
        subject: SubjectId,
        attribute: AttributeId,
        now: DateTime<Utc>,
        seconds: u64,
        ephemeral: bool,
    ) -> Result<Self, CoreError> {
        let expires_at = Self::expiry_after(now, seconds)?;
        Ok(Self::new(subject, attribute, expires_at, ephemeral))
    }

    /// The instant `seconds` after `now`, if it is representable.
    pub fn expiry_after(now: DateTime<Utc>, seconds: u64) -> Result<DateTime<Utc>, CoreError> {
        i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(CoreError::ExpiryOutOfRange { seconds, from: now })
    }

    /// Create a record from a duration string, relative to `now`.
    pub fn from_duration_text(
        subject: SubjectId,
        attribute: AttributeId,
        now: DateTime<Utc>,
        text: &str,
        ephemeral: bool,
    ) -> Result<Self, CoreError> {
        let seconds = parse_duration(text)?;
        Self::lasting(subject, attribute, now, seconds, ephemeral)
    }

    /// Whether the expiry lies strictly before `now`.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Time left until expiry, zero if already due.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

/// Why a grant ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    /// The expiry instant was reached.
    Expired,
    /// Someone else removed the attribute first.
    Cancelled,
    /// Found out of date while loading persisted state.
    Stale,
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationReason::Expired => f.write_str("expired"),
            RevocationReason::Cancelled => f.write_str("cancelled"),
            RevocationReason::Stale => f.write_str("stale"),
        }
    }
}
