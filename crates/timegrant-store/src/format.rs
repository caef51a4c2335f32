//! On-disk layout of persisted grants.
//!
//! ```text
//! {
//!   "<scope>": {
//!     "<subject>": {
//!       "assignments": [
//!         { "userid": 1, "removeat": "2024-03-01T12:00:00Z", "roleid": 2, "temporaryrole": false }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Scope and subject keys are decimal strings. `temporaryrole` may be
//! absent and then reads as `false`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use timegrant_core::{AttributeId, GrantKey, GrantRecord, ScopeId, SubjectId};

use crate::error::{Result, StoreError};

type WireDocument = BTreeMap<String, BTreeMap<String, WireSubject>>;

#[derive(Debug, Serialize, Deserialize)]
struct WireSubject {
    assignments: Vec<WireAssignment>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireAssignment {
    userid: u64,
    #[serde(with = "instant")]
    removeat: DateTime<Utc>,
    roleid: u64,
    #[serde(default)]
    temporaryrole: bool,
}

impl From<&GrantRecord> for WireAssignment {
    fn from(record: &GrantRecord) -> Self {
        Self {
            userid: record.subject.get(),
            removeat: record.expires_at,
            roleid: record.attribute.get(),
            temporaryrole: record.ephemeral,
        }
    }
}

impl From<WireAssignment> for GrantRecord {
    fn from(wire: WireAssignment) -> Self {
        GrantRecord::new(
            SubjectId::new(wire.userid),
            AttributeId::new(wire.roleid),
            wire.removeat,
            wire.temporaryrole,
        )
    }
}

/// RFC 3339 instants, always UTC with a `Z` suffix and only as many
/// fractional digits as needed to round-trip.
mod instant {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Every persisted record, grouped by (scope, subject).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    buckets: BTreeMap<GrantKey, Vec<GrantRecord>>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under a key.
    pub fn push(&mut self, key: GrantKey, record: GrantRecord) {
        self.buckets.entry(key).or_default().push(record);
    }

    /// Iterate over buckets in key order.
    pub fn buckets(&self) -> impl Iterator<Item = (&GrantKey, &[GrantRecord])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Iterate over every record with its key.
    pub fn records(&self) -> impl Iterator<Item = (GrantKey, &GrantRecord)> {
        self.buckets
            .iter()
            .flat_map(|(key, records)| records.iter().map(move |r| (*key, r)))
    }

    /// Consume into (key, record) pairs.
    pub fn into_records(self) -> impl Iterator<Item = (GrantKey, GrantRecord)> {
        self.buckets
            .into_iter()
            .flat_map(|(key, records)| records.into_iter().map(move |r| (key, r)))
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode as a JSON document. Empty buckets are left out.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut doc = WireDocument::new();
        for (key, records) in &self.buckets {
            if records.is_empty() {
                continue;
            }
            doc.entry(key.scope.to_string())
                .or_default()
                .entry(key.subject.to_string())
                .or_insert_with(|| WireSubject {
                    assignments: Vec::new(),
                })
                .assignments
                .extend(records.iter().map(WireAssignment::from));
        }
        Ok(serde_json::to_vec(&doc)?)
    }

    /// Decode a JSON document. Blank input is an empty snapshot.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        let doc: WireDocument = serde_json::from_slice(bytes)?;
        let mut snapshot = Self::new();
        for (scope, subjects) in doc {
            let scope: ScopeId = scope
                .parse()
                .map_err(|_| StoreError::InvalidData(format!("scope key {scope:?}")))?;
            for (subject, entry) in subjects {
                let subject: SubjectId = subject
                    .parse()
                    .map_err(|_| StoreError::InvalidData(format!("subject key {subject:?}")))?;
                let key = GrantKey::new(scope, subject);
                for assignment in entry.assignments {
                    snapshot.push(key, assignment.into());
                }
            }
        }
        Ok(snapshot)
    }
}

impl FromIterator<(GrantKey, GrantRecord)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (GrantKey, GrantRecord)>>(iter: T) -> Self {
        let mut snapshot = Snapshot::new();
        for (key, record) in iter {
            snapshot.push(key, record);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn key(scope: u64, subject: u64) -> GrantKey {
        GrantKey::new(ScopeId::new(scope), SubjectId::new(subject))
    }

    #[test]
    fn test_layout_matches_persisted_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.push(
            key(10, 20),
            GrantRecord::new(SubjectId::new(20), AttributeId::new(30), at, true),
        );

        let json: serde_json::Value = serde_json::from_slice(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "10": {
                    "20": {
                        "assignments": [
                            { "userid": 20, "removeat": "2024-03-01T12:00:00Z", "roleid": 30, "temporaryrole": true }
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn test_missing_temporaryrole_defaults_to_false() {
        let doc = br#"{"1":{"2":{"assignments":[{"userid":2,"removeat":"2030-01-01T00:00:00Z","roleid":3}]}}}"#;
        let snapshot = Snapshot::from_json(doc).unwrap();

        let (k, record) = snapshot.records().next().unwrap();
        assert_eq!(k, key(1, 2));
        assert_eq!(record.attribute, AttributeId::new(3));
        assert!(!record.ephemeral);
    }

    #[test]
    fn test_offset_instants_normalize_to_utc() {
        let doc = br#"{"1":{"2":{"assignments":[{"userid":2,"removeat":"2030-01-01T02:00:00+02:00","roleid":3}]}}}"#;
        let snapshot = Snapshot::from_json(doc).unwrap();
        let (_, record) = snapshot.records().next().unwrap();
        assert_eq!(
            record.expires_at,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_subsecond_instant_roundtrips_exactly() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::nanoseconds(123_456_789);
        let snapshot: Snapshot = [(
            key(1, 2),
            GrantRecord::new(SubjectId::new(2), AttributeId::new(3), at, false),
        )]
        .into_iter()
        .collect();

        let bytes = snapshot.to_json().unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("2024-03-01T12:00:00.123456789Z"));
        assert_eq!(Snapshot::from_json(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_blank_document_is_empty() {
        assert!(Snapshot::from_json(b"").unwrap().is_empty());
        assert!(Snapshot::from_json(b" \n").unwrap().is_empty());
        assert!(Snapshot::from_json(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_non_numeric_keys_rejected() {
        let doc = br#"{"guild":{"2":{"assignments":[]}}}"#;
        assert!(matches!(
            Snapshot::from_json(doc),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_empty_buckets_not_written() {
        let mut snapshot = Snapshot::new();
        snapshot.buckets.insert(key(1, 2), Vec::new());
        assert_eq!(snapshot.to_json().unwrap(), b"{}");
    }
}
