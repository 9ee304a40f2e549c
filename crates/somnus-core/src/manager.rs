//! Composition root of the alarm engine.
//!
//! `AlarmManager` owns the store, the scheduler (and through it the
//! notification sink) and one firing session per alarm. It has no internal
//! clock: every command takes `now`, and fires arrive through
//! [`handle_delivery`](AlarmManager::handle_delivery). Wrap it in a single
//! lock when commands and deliveries come from different threads.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeZone, Utc};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::alarm::{Alarm, AlarmId, NewAlarm};
use crate::error::{CoreError, Result, SinkError};
use crate::events::AlarmEvent;
use crate::firing::{AlarmSettings, FiringSession, FiringState};
use crate::quiz::{MathQuiz, QuizAnswer};
use crate::scheduler::{Delivery, ScheduledTrigger, Scheduler, TriggerKey, TriggerKind};
use crate::sink::NotificationSink;
use crate::store::{AlarmPersistence, AlarmStore};

const EVENT_CAPACITY: usize = 64;

pub struct AlarmManager<P, S, Tz = Local> {
    store: AlarmStore<P>,
    scheduler: Scheduler<S>,
    sessions: HashMap<AlarmId, FiringSession>,
    settings: AlarmSettings,
    tz: Tz,
    events: broadcast::Sender<AlarmEvent>,
    rng: Pcg64,
}

impl<P, S, Tz> AlarmManager<P, S, Tz>
where
    P: AlarmPersistence,
    S: NotificationSink,
    Tz: TimeZone,
{
    /// Build a manager. Nothing is armed until [`arm_all`](Self::arm_all).
    pub fn new(store: AlarmStore<P>, sink: S, settings: AlarmSettings, tz: Tz) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            scheduler: Scheduler::new(sink),
            sessions: HashMap::new(),
            settings,
            tz,
            events,
            rng: Pcg64::from_entropy(),
        }
    }

    /// Fix the quiz generator seed.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Pcg64::seed_from_u64(seed);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.events.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn list_alarms(&self) -> &[Alarm] {
        self.store.list()
    }

    pub fn alarm(&self, id: AlarmId) -> Option<&Alarm> {
        self.store.get(id)
    }

    pub fn enabled_count(&self) -> usize {
        self.store.list().iter().filter(|a| a.is_enabled).count()
    }

    pub fn settings(&self) -> &AlarmSettings {
        &self.settings
    }

    pub fn store(&self) -> &AlarmStore<P> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    /// Direct access to the sink, for drivers that poll it for due triggers.
    pub fn sink_mut(&mut self) -> &mut S {
        self.scheduler.sink_mut()
    }

    /// Pending regular fire time of an alarm.
    pub fn next_fire(&self, id: AlarmId) -> Option<DateTime<Utc>> {
        self.scheduler.next_fire(id)
    }

    pub fn pending_triggers(&self) -> Vec<ScheduledTrigger> {
        self.scheduler.pending_triggers()
    }

    pub fn firing_state(&self, id: AlarmId) -> FiringState {
        self.sessions
            .get(&id)
            .map(FiringSession::state)
            .unwrap_or(FiringState::Idle)
    }

    pub fn firing_session(&self, id: AlarmId) -> Option<&FiringSession> {
        self.sessions.get(&id)
    }

    /// Alarms currently in the Firing state.
    pub fn firing_alarms(&self) -> Vec<AlarmId> {
        let mut ids: Vec<AlarmId> = self
            .sessions
            .values()
            .filter(|s| s.is_firing())
            .map(FiringSession::alarm_id)
            .collect();
        ids.sort();
        ids
    }

    // ── Alarm management ─────────────────────────────────────────────

    /// Arm every enabled alarm from `now`. Returns how many were armed.
    pub fn arm_all(&mut self, now: DateTime<Utc>) -> usize {
        let enabled: Vec<Alarm> = self
            .store
            .list()
            .iter()
            .filter(|a| a.is_enabled)
            .cloned()
            .collect();
        enabled
            .iter()
            .filter(|alarm| self.arm_regular(alarm, now))
            .count()
    }

    /// Store a new enabled alarm and arm its first occurrence.
    pub fn add_alarm(&mut self, spec: NewAlarm, now: DateTime<Utc>) -> Alarm {
        let alarm = Alarm::new(spec);
        self.store.add(alarm.clone());
        info!(alarm_id = %alarm.id(), time = %alarm.time, days = %alarm.repeat_days, "alarm added");
        self.publish(AlarmEvent::AlarmAdded {
            alarm: alarm.clone(),
            at: now,
        });
        self.arm_regular(&alarm, now);
        alarm
    }

    /// Replace time, label and repeat days. An enabled alarm is re-armed.
    pub fn update_alarm(&mut self, id: AlarmId, spec: NewAlarm, now: DateTime<Utc>) -> Result<Alarm> {
        let alarm = self
            .store
            .update(id, |a| a.apply(spec))
            .ok_or(CoreError::AlarmNotFound(id))?;
        self.publish(AlarmEvent::AlarmUpdated {
            alarm: alarm.clone(),
            at: now,
        });
        if alarm.is_enabled {
            self.arm_regular(&alarm, now);
        }
        Ok(alarm)
    }

    /// Flip `is_enabled`. Enabling arms from `now`; disabling cancels the
    /// regular and snooze triggers.
    pub fn toggle_alarm(&mut self, id: AlarmId, now: DateTime<Utc>) -> Result<Alarm> {
        let alarm = self
            .store
            .update(id, |a| a.is_enabled = !a.is_enabled)
            .ok_or(CoreError::AlarmNotFound(id))?;
        info!(alarm_id = %id, enabled = alarm.is_enabled, "alarm toggled");
        self.publish(AlarmEvent::AlarmUpdated {
            alarm: alarm.clone(),
            at: now,
        });
        if alarm.is_enabled {
            self.arm_regular(&alarm, now);
        } else {
            self.scheduler.cancel(&TriggerKey::alarm(id));
            self.scheduler.cancel(&TriggerKey::snooze(id));
        }
        Ok(alarm)
    }

    /// Remove an alarm and every trigger it owns. Unknown ids are a no-op.
    pub fn delete_alarm(&mut self, id: AlarmId, now: DateTime<Utc>) -> Option<Alarm> {
        self.scheduler.cancel_alarm(id);
        self.sessions.remove(&id);
        let removed = self.store.remove(id)?;
        info!(alarm_id = %id, "alarm deleted");
        self.publish(AlarmEvent::AlarmRemoved { alarm_id: id, at: now });
        Some(removed)
    }

    // ── Firing ───────────────────────────────────────────────────────

    /// Handle a fire callback from the sink.
    ///
    /// Returns the event that was published, or `None` when the delivery was
    /// ignored (cancelled key, early delivery, deleted alarm).
    pub fn handle_delivery(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Option<AlarmEvent> {
        let trigger = match self.scheduler.accept_delivery(&key, now) {
            Delivery::Accepted(trigger) => trigger,
            Delivery::Early(_) | Delivery::Unknown => return None,
        };
        let Some(alarm) = self.store.get(key.alarm_id).cloned() else {
            debug!(%key, "delivery for deleted alarm");
            return None;
        };

        match key.kind {
            TriggerKind::Alarm if !alarm.is_enabled => {
                debug!(%key, "delivery for disabled alarm");
                None
            }
            TriggerKind::Alarm | TriggerKind::Snooze => {
                Some(self.fire(alarm, key.kind, trigger.fire_at, now))
            }
            TriggerKind::Reannounce => self.reannounce(alarm.id(), now),
        }
    }

    /// Submit an answer to the firing alarm's quiz.
    pub fn answer_quiz(&mut self, id: AlarmId, choice: u32) -> Result<QuizAnswer> {
        self.sessions
            .get_mut(&id)
            .and_then(|session| session.answer(choice))
            .ok_or(CoreError::NotFiring(id))
    }

    /// `Firing -> Dismissed`. Cancels re-announcements and any pending snooze.
    pub fn dismiss(&mut self, id: AlarmId, now: DateTime<Utc>) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&id)
            .filter(|s| s.is_firing())
            .ok_or(CoreError::NotFiring(id))?;
        if !session.dismiss(now) {
            return Err(CoreError::ChallengeIncomplete(id));
        }

        self.scheduler.cancel(&TriggerKey::reannounce(id));
        self.scheduler.cancel(&TriggerKey::snooze(id));
        if let Some(alarm) = self.store.get(id).cloned() {
            if alarm.is_enabled && alarm.is_repeating() && self.scheduler.next_fire(id).is_none() {
                self.arm_regular(&alarm, now);
            }
        }

        info!(alarm_id = %id, "alarm dismissed");
        self.publish(AlarmEvent::AlarmDismissed { alarm_id: id, at: now });
        Ok(())
    }

    /// `Firing -> Snoozed`. Arms a one-shot snooze trigger and returns its
    /// fire time. The regular schedule is left alone.
    pub fn snooze(&mut self, id: AlarmId, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let until = now + self.settings.snooze;
        let snoozed = self
            .sessions
            .get_mut(&id)
            .map(|s| s.snooze(now, until))
            .unwrap_or(false);
        if !snoozed {
            return Err(CoreError::NotFiring(id));
        }

        self.scheduler.cancel(&TriggerKey::reannounce(id));
        self.arm_key(TriggerKey::snooze(id), until, false, now);

        info!(alarm_id = %id, %until, "alarm snoozed");
        self.publish(AlarmEvent::AlarmSnoozed {
            alarm_id: id,
            until,
            at: now,
        });
        Ok(until)
    }

    fn fire(
        &mut self,
        alarm: Alarm,
        kind: TriggerKind,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AlarmEvent {
        let id = alarm.id();

        if kind == TriggerKind::Alarm {
            // A fresh occurrence supersedes an outstanding snooze.
            self.scheduler.cancel(&TriggerKey::snooze(id));
            if alarm.is_repeating() {
                self.arm_regular(&alarm, now.max(fire_at));
            } else if let Some(disabled) = self.store.update(id, |a| a.is_enabled = false) {
                self.publish(AlarmEvent::AlarmUpdated {
                    alarm: disabled,
                    at: now,
                });
            }
        }

        let quiz = self
            .settings
            .quiz_questions
            .map(|count| MathQuiz::generate(&mut self.rng, count));
        if let Some(previous) = self.sessions.get(&id) {
            if previous.is_firing() {
                debug!(alarm_id = %id, "restarting firing session");
            }
        }
        self.sessions
            .insert(id, FiringSession::start(id, now, quiz.clone()));

        info!(alarm_id = %id, trigger = ?kind, label = %alarm.label, "alarm firing");
        let event = AlarmEvent::AlarmFired {
            alarm_id: id,
            label: alarm.label,
            trigger: kind,
            quiz,
            at: now,
        };
        self.publish(event.clone());

        if let Some(next) = self.settings.reannounce.next_at(0, now) {
            self.arm_key(TriggerKey::reannounce(id), next, false, now);
        }
        event
    }

    fn reannounce(&mut self, id: AlarmId, now: DateTime<Utc>) -> Option<AlarmEvent> {
        let policy = self.settings.reannounce;
        let attempt = self.sessions.get_mut(&id)?.record_reannounce(&policy)?;

        debug!(alarm_id = %id, attempt, "re-announcing");
        let event = AlarmEvent::AlarmReannounced {
            alarm_id: id,
            attempt,
            at: now,
        };
        self.publish(event.clone());

        match policy.next_at(attempt, now) {
            Some(next) => {
                self.arm_key(TriggerKey::reannounce(id), next, false, now);
            }
            None => {
                info!(alarm_id = %id, attempts = attempt, "re-announcements exhausted");
                self.publish(AlarmEvent::ReannounceExhausted {
                    alarm_id: id,
                    attempts: attempt,
                    at: now,
                });
            }
        }
        Some(event)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn arm_regular(&mut self, alarm: &Alarm, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        match self.scheduler.arm_alarm(alarm, &local) {
            Ok(trigger) => {
                info!(alarm_id = %alarm.id(), fire_at = %trigger.fire_at, "alarm armed");
                self.publish(AlarmEvent::TriggerArmed {
                    key: trigger.key,
                    fire_at: trigger.fire_at,
                });
                true
            }
            Err(e) => {
                self.scheduling_failed(TriggerKey::alarm(alarm.id()), e, now);
                false
            }
        }
    }

    fn arm_key(
        &mut self,
        key: TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
        now: DateTime<Utc>,
    ) -> bool {
        match self.scheduler.arm(key, fire_at, repeats) {
            Ok(_) => {
                self.publish(AlarmEvent::TriggerArmed { key, fire_at });
                true
            }
            Err(e) => {
                self.scheduling_failed(key, e, now);
                false
            }
        }
    }

    fn scheduling_failed(&self, key: TriggerKey, error: SinkError, now: DateTime<Utc>) {
        warn!(%key, error = %error, "trigger not armed; alarm may not fire");
        self.publish(AlarmEvent::SchedulingFailed {
            key,
            reason: error.to_string(),
            at: now,
        });
    }

    fn publish(&self, event: AlarmEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
