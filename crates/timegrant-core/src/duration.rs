//! Compact duration syntax.
//!
//! A duration is a run of `<digits><unit>` groups, e.g. `3d7h13m45s`:
//!
//! | Unit | Meaning | Seconds |
//! |------|---------|---------|
//! | `w`  | weeks   | 604800  |
//! | `d`  | days    | 86400   |
//! | `h`  | hours   | 3600    |
//! | `m`  | minutes | 60      |
//! | `s`  | seconds | 1       |
//!
//! Whitespace is ignored anywhere. Each unit may appear once. Digits left
//! over at the end count as minutes, unless minutes were already given, in
//! which case they are dropped.

use std::fmt;

use crate::error::ParseError;

/// One slot of a duration string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationField {
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl DurationField {
    /// Map a unit letter to its field.
    pub fn from_unit(unit: char) -> Option<Self> {
        match unit {
            'w' => Some(DurationField::Weeks),
            'd' => Some(DurationField::Days),
            'h' => Some(DurationField::Hours),
            'm' => Some(DurationField::Minutes),
            's' => Some(DurationField::Seconds),
            _ => None,
        }
    }

    /// The unit letter for this field.
    pub const fn unit(self) -> char {
        match self {
            DurationField::Weeks => 'w',
            DurationField::Days => 'd',
            DurationField::Hours => 'h',
            DurationField::Minutes => 'm',
            DurationField::Seconds => 's',
        }
    }

    /// Number of seconds one unit of this field stands for.
    pub const fn seconds(self) -> u64 {
        match self {
            DurationField::Weeks => 7 * 24 * 60 * 60,
            DurationField::Days => 24 * 60 * 60,
            DurationField::Hours => 60 * 60,
            DurationField::Minutes => 60,
            DurationField::Seconds => 1,
        }
    }

    const fn slot(self) -> usize {
        match self {
            DurationField::Weeks => 0,
            DurationField::Days => 1,
            DurationField::Hours => 2,
            DurationField::Minutes => 3,
            DurationField::Seconds => 4,
        }
    }

    const ALL: [DurationField; 5] = [
        DurationField::Weeks,
        DurationField::Days,
        DurationField::Hours,
        DurationField::Minutes,
        DurationField::Seconds,
    ];
}

impl fmt::Display for DurationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DurationField::Weeks => "WEEKS",
            DurationField::Days => "DAYS",
            DurationField::Hours => "HOURS",
            DurationField::Minutes => "MINUTES",
            DurationField::Seconds => "SECONDS",
        };
        f.write_str(name)
    }
}

/// Parse a duration string into a total number of seconds.
///
/// Indices in errors are character positions in `input`.
pub fn parse_duration(input: &str) -> Result<u64, ParseError> {
    let overflow = || ParseError::Overflow {
        input: input.to_string(),
    };

    let mut slots: [Option<u64>; 5] = [None; 5];
    let mut current: u64 = 0;

    for (index, ch) in input.chars().enumerate() {
        if let Some(digit) = ch.to_digit(10) {
            current = current
                .checked_mul(10)
                .and_then(|c| c.checked_add(u64::from(digit)))
                .ok_or_else(overflow)?;
            continue;
        }

        if ch.is_whitespace() {
            continue;
        }

        let field = DurationField::from_unit(ch).ok_or(ParseError::UnknownUnit { unit: ch, index })?;
        let slot = &mut slots[field.slot()];
        if slot.is_some() {
            return Err(ParseError::DuplicateField {
                field,
                index,
                input: input.to_string(),
            });
        }
        *slot = Some(current);
        current = 0;
    }

    // Bare trailing digits only fill an unset minutes slot.
    let minutes = &mut slots[DurationField::Minutes.slot()];
    if current != 0 && minutes.is_none() {
        *minutes = Some(current);
    }

    DurationField::ALL.iter().try_fold(0u64, |total, field| {
        let count = slots[field.slot()].unwrap_or(0);
        count
            .checked_mul(field.seconds())
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(overflow)
    })
}
