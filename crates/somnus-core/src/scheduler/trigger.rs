use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;
use crate::error::ValidationError;

/// What a sink registration is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Regular occurrence computed from the alarm's time and repeat days.
    Alarm,
    Snooze,
    Reannounce,
}

impl TriggerKind {
    fn prefix(self) -> &'static str {
        match self {
            TriggerKind::Alarm => "",
            TriggerKind::Snooze => "snooze-",
            TriggerKind::Reannounce => "reannounce-",
        }
    }
}

/// Identifier of a registration with the notification sink.
///
/// Renders as `<uuid>`, `snooze-<uuid>` or `reannounce-<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TriggerKey {
    pub alarm_id: AlarmId,
    pub kind: TriggerKind,
}

impl TriggerKey {
    pub fn alarm(alarm_id: AlarmId) -> Self {
        Self {
            alarm_id,
            kind: TriggerKind::Alarm,
        }
    }

    pub fn snooze(alarm_id: AlarmId) -> Self {
        Self {
            alarm_id,
            kind: TriggerKind::Snooze,
        }
    }

    pub fn reannounce(alarm_id: AlarmId) -> Self {
        Self {
            alarm_id,
            kind: TriggerKind::Reannounce,
        }
    }

    /// All keys that can exist for one alarm.
    pub fn all_for(alarm_id: AlarmId) -> [TriggerKey; 3] {
        [
            Self::alarm(alarm_id),
            Self::snooze(alarm_id),
            Self::reannounce(alarm_id),
        ]
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.alarm_id)
    }
}

impl FromStr for TriggerKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = if let Some(rest) = s.strip_prefix("snooze-") {
            (TriggerKind::Snooze, rest)
        } else if let Some(rest) = s.strip_prefix("reannounce-") {
            (TriggerKind::Reannounce, rest)
        } else {
            (TriggerKind::Alarm, s)
        };
        let alarm_id = rest.parse().map_err(|_| ValidationError::InvalidValue {
            field: "trigger_key".to_string(),
            message: format!("'{s}' is not a trigger key"),
        })?;
        Ok(Self { alarm_id, kind })
    }
}

impl From<TriggerKey> for String {
    fn from(key: TriggerKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for TriggerKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A registration the scheduler believes is armed in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    pub key: TriggerKey,
    pub fire_at: DateTime<Utc>,
    pub repeats: bool,
}

impl ScheduledTrigger {
    pub fn alarm_id(&self) -> AlarmId {
        self.key.alarm_id
    }
}
