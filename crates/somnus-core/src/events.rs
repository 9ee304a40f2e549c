use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{Alarm, AlarmId};
use crate::quiz::MathQuiz;
use crate::scheduler::{TriggerKey, TriggerKind};

/// Every state change in the alarm engine produces an event.
/// The UI subscribes to them to present the firing screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlarmEvent {
    AlarmAdded {
        alarm: Alarm,
        at: DateTime<Utc>,
    },
    AlarmUpdated {
        alarm: Alarm,
        at: DateTime<Utc>,
    },
    AlarmRemoved {
        alarm_id: AlarmId,
        at: DateTime<Utc>,
    },
    /// A trigger was registered with the notification sink.
    TriggerArmed {
        key: TriggerKey,
        fire_at: DateTime<Utc>,
    },
    /// The sink refused a registration; the alarm may not fire.
    SchedulingFailed {
        key: TriggerKey,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Alarm entered the Firing state.
    AlarmFired {
        alarm_id: AlarmId,
        label: String,
        trigger: TriggerKind,
        quiz: Option<MathQuiz>,
        at: DateTime<Utc>,
    },
    AlarmReannounced {
        alarm_id: AlarmId,
        attempt: u32,
        at: DateTime<Utc>,
    },
    /// Re-announcement cap reached. The alarm keeps firing silently.
    ReannounceExhausted {
        alarm_id: AlarmId,
        attempts: u32,
        at: DateTime<Utc>,
    },
    AlarmDismissed {
        alarm_id: AlarmId,
        at: DateTime<Utc>,
    },
    AlarmSnoozed {
        alarm_id: AlarmId,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
}

impl AlarmEvent {
    /// The alarm this event is about.
    pub fn alarm_id(&self) -> AlarmId {
        match self {
            AlarmEvent::AlarmAdded { alarm, .. } | AlarmEvent::AlarmUpdated { alarm, .. } => {
                alarm.id()
            }
            AlarmEvent::TriggerArmed { key, .. } | AlarmEvent::SchedulingFailed { key, .. } => {
                key.alarm_id
            }
            AlarmEvent::AlarmRemoved { alarm_id, .. }
            | AlarmEvent::AlarmFired { alarm_id, .. }
            | AlarmEvent::AlarmReannounced { alarm_id, .. }
            | AlarmEvent::ReannounceExhausted { alarm_id, .. }
            | AlarmEvent::AlarmDismissed { alarm_id, .. }
            | AlarmEvent::AlarmSnoozed { alarm_id, .. } => *alarm_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let id = AlarmId::new();
        let event = AlarmEvent::AlarmSnoozed {
            alarm_id: id,
            until: Utc::now(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AlarmSnoozed");
        assert_eq!(json["alarm_id"], id.to_string());

        let back: AlarmEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.alarm_id(), id);
    }

    #[test]
    fn trigger_events_report_owning_alarm() {
        let id = AlarmId::new();
        let event = AlarmEvent::TriggerArmed {
            key: TriggerKey::reannounce(id),
            fire_at: Utc::now(),
        };
        assert_eq!(event.alarm_id(), id);
    }
}
