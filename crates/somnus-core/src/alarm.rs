//! Alarm records and the input types that create them.
//!
//! Weekday indices follow the Sunday-first convention used by the alarm list:
//! `0 = Sun`, `1 = Mon`, ... `6 = Sat`.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const DAY_FULL_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Stable identifier of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(Uuid);

impl AlarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AlarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AlarmId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Set of weekdays on which an alarm repeats. Empty means one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct RepeatDays(u8);

impl RepeatDays {
    pub const NONE: RepeatDays = RepeatDays(0);
    pub const EVERY_DAY: RepeatDays = RepeatDays(0b0111_1111);

    pub fn new() -> Self {
        Self::NONE
    }

    /// Build a set from Sunday-first indices.
    ///
    /// # Errors
    /// Returns [`ValidationError::DayOutOfRange`] for any index above 6.
    pub fn from_indices<I>(indices: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut days = Self::NONE;
        for index in indices {
            days.insert(index)?;
        }
        Ok(days)
    }

    /// # Errors
    /// Returns [`ValidationError::DayOutOfRange`] for any index above 6.
    pub fn insert(&mut self, index: u8) -> Result<(), ValidationError> {
        if index > 6 {
            return Err(ValidationError::DayOutOfRange(index));
        }
        self.0 |= 1 << index;
        Ok(())
    }

    pub fn contains(&self, index: u8) -> bool {
        index <= 6 && self.0 & (1 << index) != 0
    }

    pub fn contains_weekday(&self, weekday: Weekday) -> bool {
        self.contains(weekday.num_days_from_sunday() as u8)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..7u8).filter(move |i| self.contains(*i))
    }
}

impl TryFrom<Vec<u8>> for RepeatDays {
    type Error = ValidationError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_indices(value)
    }
}

impl From<RepeatDays> for Vec<u8> {
    fn from(days: RepeatDays) -> Self {
        days.iter().collect()
    }
}

impl fmt::Display for RepeatDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Never");
        }
        if *self == Self::EVERY_DAY {
            return f.write_str("Every day");
        }
        let names: Vec<&str> = self.iter().map(|i| DAY_NAMES[i as usize]).collect();
        f.write_str(&names.join(", "))
    }
}

/// Parse one weekday token: `sun`, `Sunday`, or a digit `0`..`6`.
///
/// # Errors
/// Returns [`ValidationError::InvalidDay`] when the token is not recognised.
pub fn parse_day(token: &str) -> Result<u8, ValidationError> {
    let trimmed = token.trim();
    if let Ok(index) = trimmed.parse::<u8>() {
        return if index <= 6 {
            Ok(index)
        } else {
            Err(ValidationError::DayOutOfRange(index))
        };
    }
    let lower = trimmed.to_ascii_lowercase();
    DAY_FULL_NAMES
        .iter()
        .position(|name| *name == lower || (lower.len() >= 3 && name.starts_with(&lower)))
        .map(|i| i as u8)
        .ok_or_else(|| ValidationError::InvalidDay {
            input: token.to_string(),
        })
}

/// Parse a wall-clock time of day in `HH:MM` form.
///
/// # Errors
/// Returns [`ValidationError::InvalidTime`] when the input is not a valid time.
pub fn parse_time(input: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").map_err(|_| ValidationError::InvalidTime {
        input: input.to_string(),
    })
}

/// An alarm as stored and scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    id: AlarmId,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    #[serde(default)]
    pub label: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub repeat_days: RepeatDays,
}

impl Alarm {
    /// Create an enabled alarm with a fresh id.
    pub fn new(spec: NewAlarm) -> Self {
        Self::with_id(AlarmId::new(), spec)
    }

    pub fn with_id(id: AlarmId, spec: NewAlarm) -> Self {
        Self {
            id,
            time: spec.time,
            label: spec.label,
            is_enabled: true,
            repeat_days: spec.repeat_days,
        }
    }

    pub fn id(&self) -> AlarmId {
        self.id
    }

    pub fn is_repeating(&self) -> bool {
        !self.repeat_days.is_empty()
    }

    /// Replace the editable fields, keeping id and enabled flag.
    pub fn apply(&mut self, spec: NewAlarm) {
        self.time = spec.time;
        self.label = spec.label;
        self.repeat_days = spec.repeat_days;
    }
}

/// Validated input for creating or editing an alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlarm {
    pub time: NaiveTime,
    pub label: String,
    pub repeat_days: RepeatDays,
}

impl NewAlarm {
    /// Seconds and sub-seconds are dropped; alarms are minute-granular.
    pub fn new(time: NaiveTime, label: impl Into<String>, repeat_days: RepeatDays) -> Self {
        let time = time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time);
        Self {
            time,
            label: label.into(),
            repeat_days,
        }
    }
}

/// Raw, unvalidated alarm input as typed by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSpec {
    pub time: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub days: Vec<String>,
}

impl AlarmSpec {
    /// Validate into a [`NewAlarm`].
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] found in the time or day tokens.
    pub fn parse(&self) -> Result<NewAlarm, ValidationError> {
        let time = parse_time(&self.time)?;
        let mut days = RepeatDays::new();
        for token in self.days.iter().filter(|t| !t.trim().is_empty()) {
            days.insert(parse_day(token)?)?;
        }
        Ok(NewAlarm::new(time, self.label.trim(), days))
    }
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
