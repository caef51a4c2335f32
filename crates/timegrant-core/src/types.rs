//! Strong type definitions for timegrant.
//!
//! All identifiers are newtypes to prevent mixing up a subject with the
//! attribute granted to it at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create an identifier from its raw value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| CoreError::InvalidId(s.to_string()))
            }
        }
    };
}

numeric_id!(
    /// Administrative domain (a server or community) that subjects and
    /// attributes live in.
    ScopeId
);

numeric_id!(
    /// The entity receiving a temporary attribute.
    SubjectId
);

numeric_id!(
    /// The revocable entity granted to a subject.
    AttributeId
);

/// Key of the grant index: one bucket per subject per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrantKey {
    pub scope: ScopeId,
    pub subject: SubjectId,
}

impl GrantKey {
    pub const fn new(scope: ScopeId, subject: SubjectId) -> Self {
        Self { scope, subject }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_parse() {
        let id = SubjectId::new(226_102_144_019_939_328);
        let text = id.to_string();
        assert_eq!(text, "226102144019939328");
        assert_eq!(text.parse::<SubjectId>().unwrap(), id);
    }

    #[test]
    fn test_id_parse_rejects_garbage() {
        assert!(matches!(
            "abc".parse::<ScopeId>(),
            Err(CoreError::InvalidId(_))
        ));
        assert!("-1".parse::<AttributeId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&AttributeId::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_grant_key_display() {
        let key = GrantKey::new(ScopeId::new(1), SubjectId::new(2));
        assert_eq!(key.to_string(), "1:2");
        assert_eq!(format!("{:?}", key.subject), "SubjectId(2)");
    }
}
