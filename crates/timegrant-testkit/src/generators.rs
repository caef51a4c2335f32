//! Proptest generators for property-based testing.

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use timegrant_core::{AttributeId, DurationField, GrantKey, GrantRecord, ScopeId, SubjectId};

/// A valid duration string and the number of seconds it stands for.
#[derive(Debug, Clone)]
pub struct DurationCase {
    pub text: String,
    pub seconds: u64,
}

impl Arbitrary for DurationCase {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let fields = (
            prop::option::of(0u64..100),
            prop::option::of(0u64..400),
            prop::option::of(0u64..48),
            prop::option::of(0u64..120),
            prop::option::of(0u64..120),
        )
            .prop_map(|(w, d, h, m, s)| {
                [
                    (DurationField::Weeks, w),
                    (DurationField::Days, d),
                    (DurationField::Hours, h),
                    (DurationField::Minutes, m),
                    (DurationField::Seconds, s),
                ]
                .into_iter()
                .filter_map(|(field, value)| value.map(|v| (field, v)))
                .collect::<Vec<_>>()
            })
            .prop_shuffle();

        (fields, any::<bool>(), any::<bool>())
            .prop_map(|(fields, bare_minutes, spaced)| {
                let seconds = fields
                    .iter()
                    .map(|(field, value)| field.seconds() * value)
                    .sum();

                let mut groups: Vec<String> = fields
                    .iter()
                    .filter(|(field, _)| !bare_minutes || *field != DurationField::Minutes)
                    .map(|(field, value)| format!("{value}{}", field.unit()))
                    .collect();
                if bare_minutes {
                    if let Some((_, value)) =
                        fields.iter().find(|(field, _)| *field == DurationField::Minutes)
                    {
                        groups.push(value.to_string());
                    }
                }

                let text = groups.join(if spaced { " " } else { "" });
                DurationCase { text, seconds }
            })
            .boxed()
    }
}

/// Generate an instant between 1970 and 2100, with nanoseconds.
pub fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000_000)
        .prop_filter_map("out of range", |(secs, nanos)| {
            DateTime::from_timestamp(secs, nanos)
        })
}

/// Generate a grant record together with its index key.
pub fn grant_record() -> impl Strategy<Value = (GrantKey, GrantRecord)> {
    (any::<u64>(), any::<u64>(), any::<u64>(), instant(), any::<bool>()).prop_map(
        |(scope, subject, attribute, expires_at, ephemeral)| {
            let subject = SubjectId::new(subject);
            (
                GrantKey::new(ScopeId::new(scope), subject),
                GrantRecord::new(subject, AttributeId::new(attribute), expires_at, ephemeral),
            )
        },
    )
}
