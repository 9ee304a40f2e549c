//! Trigger scheduling on top of a [`NotificationSink`].
//!
//! The scheduler owns the sink and a table of registrations it believes are
//! armed. Arming a key that is already pending replaces the old
//! registration, so there is never more than one regular trigger per alarm.

mod occurrence;
mod trigger;

pub use occurrence::next_occurrence;
pub use trigger::{ScheduledTrigger, TriggerKey, TriggerKind};

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

use crate::alarm::{Alarm, AlarmId};
use crate::error::SinkError;
use crate::sink::NotificationSink;

/// Deliveries this far ahead of `fire_at` still count as on time.
const DELIVERY_TOLERANCE_SECS: i64 = 1;

/// What the scheduler made of a sink delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted(ScheduledTrigger),
    /// Arrived before `fire_at`; re-registered with the sink.
    Early(ScheduledTrigger),
    /// Cancelled or never armed.
    Unknown,
}

pub struct Scheduler<S> {
    sink: S,
    pending: HashMap<TriggerKey, ScheduledTrigger>,
}

impl<S: NotificationSink> Scheduler<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: HashMap::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn pending(&self, key: &TriggerKey) -> Option<&ScheduledTrigger> {
        self.pending.get(key)
    }

    pub fn is_pending(&self, key: &TriggerKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Pending regular fire time of an alarm.
    pub fn next_fire(&self, alarm_id: AlarmId) -> Option<DateTime<Utc>> {
        self.pending
            .get(&TriggerKey::alarm(alarm_id))
            .map(|t| t.fire_at)
    }

    /// All pending registrations, earliest first.
    pub fn pending_triggers(&self) -> Vec<ScheduledTrigger> {
        let mut triggers: Vec<ScheduledTrigger> = self.pending.values().copied().collect();
        triggers.sort_by_key(|t| (t.fire_at, t.key));
        triggers
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Register `key` with the sink, replacing any pending registration.
    ///
    /// # Errors
    /// Returns the sink's error; nothing is recorded as pending in that case.
    pub fn arm(
        &mut self,
        key: TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
    ) -> Result<ScheduledTrigger, SinkError> {
        if self.pending.remove(&key).is_some() {
            self.sink.cancel(&key);
        }
        self.sink.schedule(&key, fire_at, repeats)?;
        let trigger = ScheduledTrigger {
            key,
            fire_at,
            repeats,
        };
        self.pending.insert(key, trigger);
        Ok(trigger)
    }

    /// Arm the next regular occurrence of `alarm` after `now`.
    ///
    /// # Errors
    /// Returns the sink's error when registration fails.
    pub fn arm_alarm<Tz: TimeZone>(
        &mut self,
        alarm: &Alarm,
        now: &DateTime<Tz>,
    ) -> Result<ScheduledTrigger, SinkError> {
        let fire_at = next_occurrence(now, alarm.time, alarm.repeat_days).with_timezone(&Utc);
        self.arm(TriggerKey::alarm(alarm.id()), fire_at, alarm.is_repeating())
    }

    /// Cancel one registration. The sink is told even if nothing is pending.
    pub fn cancel(&mut self, key: &TriggerKey) -> Option<ScheduledTrigger> {
        self.sink.cancel(key);
        self.pending.remove(key)
    }

    /// Cancel every registration belonging to an alarm.
    pub fn cancel_alarm(&mut self, alarm_id: AlarmId) {
        for key in TriggerKey::all_for(alarm_id) {
            self.cancel(&key);
        }
    }

    /// Match a sink delivery against the pending table.
    ///
    /// Accepted deliveries are removed from the table; the caller decides
    /// what to arm next.
    pub fn accept_delivery(&mut self, key: &TriggerKey, now: DateTime<Utc>) -> Delivery {
        let Some(trigger) = self.pending.get(key).copied() else {
            debug!(%key, "ignoring delivery for unknown trigger");
            return Delivery::Unknown;
        };
        if trigger.fire_at > now + Duration::seconds(DELIVERY_TOLERANCE_SECS) {
            debug!(%key, fire_at = %trigger.fire_at, %now, "early delivery, re-arming");
            if self
                .sink
                .schedule(key, trigger.fire_at, trigger.repeats)
                .is_err()
            {
                self.pending.remove(key);
            }
            return Delivery::Early(trigger);
        }
        self.pending.remove(key);
        Delivery::Accepted(trigger)
    }
}
