//! End-to-end alarm lifecycle tests.
//!
//! The manager runs on a `RecordingSink`, and the tests drive time by hand:
//! take whatever the sink says is due and hand it back as a delivery.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use somnus_core::{
    AlarmEvent, AlarmId, AlarmManager, AlarmSettings, AlarmStore, FiringState, MemoryPersistence,
    NewAlarm, RecordingSink, RepeatDays, TriggerKey, TriggerKind,
};

type Manager = AlarmManager<MemoryPersistence, RecordingSink, Utc>;

fn settings() -> AlarmSettings {
    AlarmSettings {
        quiz_questions: None,
        ..AlarmSettings::default()
    }
}

fn manager_with(persistence: MemoryPersistence) -> Manager {
    AlarmManager::new(
        AlarmStore::load(persistence),
        RecordingSink::new(),
        settings(),
        Utc,
    )
    .with_rng_seed(42)
}

fn manager() -> Manager {
    manager_with(MemoryPersistence::new())
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
}

fn alarm_at(hour: u32, minute: u32, days: &[u8]) -> NewAlarm {
    NewAlarm::new(
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        "Wake up",
        RepeatDays::from_indices(days.iter().copied()).unwrap(),
    )
}

/// Deliver everything due at `now` and return the fire events.
fn deliver_due(m: &mut Manager, now: DateTime<Utc>) -> Vec<AlarmEvent> {
    let due = m.sink_mut().take_due(now);
    due.into_iter()
        .filter_map(|key| m.handle_delivery(key, now))
        .collect()
}

fn fired(events: &[AlarmEvent], id: AlarmId) -> bool {
    events
        .iter()
        .any(|e| matches!(e, AlarmEvent::AlarmFired { alarm_id, .. } if *alarm_id == id))
}

#[test]
fn test_repeating_alarm_next_fire_from_tuesday() {
    // 2025-01-07 is a Tuesday.
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[1, 3, 5]), at(7, 8, 0));
    assert_eq!(m.next_fire(alarm.id()), Some(at(8, 7, 0)));
}

#[test]
fn test_one_shot_before_and_after_alarm_time() {
    let mut m = manager();
    let before = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 59));
    let after = m.add_alarm(alarm_at(7, 0, &[]), at(6, 7, 1));
    assert_eq!(m.next_fire(before.id()), Some(at(6, 7, 0)));
    assert_eq!(m.next_fire(after.id()), Some(at(7, 7, 0)));
}

#[test]
fn test_one_shot_fires_once_then_disables() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));

    let events = deliver_due(&mut m, at(6, 7, 0));
    assert!(fired(&events, alarm.id()));
    assert!(!m.alarm(alarm.id()).unwrap().is_enabled);
    assert_eq!(m.next_fire(alarm.id()), None);

    m.dismiss(alarm.id(), at(6, 7, 1)).unwrap();

    // A week later nothing else has fired.
    let mut fires = 0;
    let mut now = at(6, 7, 1);
    while now < at(13, 7, 1) {
        now += Duration::hours(1);
        fires += deliver_due(&mut m, now)
            .iter()
            .filter(|e| matches!(e, AlarmEvent::AlarmFired { .. }))
            .count();
    }
    assert_eq!(fires, 0);
}

#[test]
fn test_repeating_alarm_fires_only_on_selected_days() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[1, 3, 5]), at(5, 12, 0));

    let mut fired_on = Vec::new();
    let mut now = at(5, 12, 0);
    while now < at(19, 12, 0) {
        now += Duration::minutes(30);
        let events = deliver_due(&mut m, now);
        if fired(&events, alarm.id()) {
            fired_on.push(now.weekday());
            m.dismiss(alarm.id(), now).unwrap();
        }
    }
    assert_eq!(
        fired_on,
        vec![
            Weekday::Mon,
            Weekday::Wed,
            Weekday::Fri,
            Weekday::Mon,
            Weekday::Wed,
            Weekday::Fri
        ]
    );
    assert!(m.alarm(alarm.id()).unwrap().is_enabled);
}

#[test]
fn test_repeating_alarm_arms_next_occurrence_when_fired() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[1, 3, 5]), at(5, 12, 0));
    deliver_due(&mut m, at(6, 7, 0));
    assert_eq!(m.firing_state(alarm.id()), FiringState::Firing);
    assert_eq!(m.next_fire(alarm.id()), Some(at(8, 7, 0)));
}

#[test]
fn test_toggle_twice_restores_state_and_rearms() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    let key = TriggerKey::alarm(alarm.id());

    let off = m.toggle_alarm(alarm.id(), at(6, 6, 10)).unwrap();
    assert!(!off.is_enabled);
    assert!(!m.sink_mut().is_pending(&key));

    let on = m.toggle_alarm(alarm.id(), at(6, 6, 20)).unwrap();
    assert!(on.is_enabled);
    assert_eq!(m.sink_mut().fire_at(&key), Some(at(6, 7, 0)));
}

#[test]
fn test_reenabling_computes_from_current_time() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    m.toggle_alarm(alarm.id(), at(6, 6, 30)).unwrap();
    m.toggle_alarm(alarm.id(), at(6, 9, 0)).unwrap();
    assert_eq!(m.next_fire(alarm.id()), Some(at(7, 7, 0)));
}

#[test]
fn test_disabled_alarm_does_not_fire() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    m.toggle_alarm(alarm.id(), at(6, 6, 30)).unwrap();
    let events = deliver_due(&mut m, at(6, 7, 0));
    assert!(events.is_empty());

    // A stale delivery straight from the platform is ignored too.
    assert!(m
        .handle_delivery(TriggerKey::alarm(alarm.id()), at(6, 7, 0))
        .is_none());
}

#[test]
fn test_delete_removes_and_cancels() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[0, 1, 2, 3, 4, 5, 6]), at(6, 6, 0));
    let removed = m.delete_alarm(alarm.id(), at(6, 6, 5)).unwrap();
    assert_eq!(removed.id(), alarm.id());
    assert!(m.list_alarms().is_empty());

    for key in TriggerKey::all_for(alarm.id()) {
        assert!(!m.sink_mut().is_pending(&key));
    }
    assert!(m
        .handle_delivery(TriggerKey::alarm(alarm.id()), at(6, 7, 0))
        .is_none());
    assert!(deliver_due(&mut m, at(13, 7, 0)).is_empty());
}

#[test]
fn test_delete_while_firing_stops_reannouncing() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    deliver_due(&mut m, at(6, 7, 0));
    m.delete_alarm(alarm.id(), at(6, 7, 0)).unwrap();
    assert_eq!(m.firing_state(alarm.id()), FiringState::Idle);
    assert!(deliver_due(&mut m, at(6, 7, 5)).is_empty());
}

#[test]
fn test_snooze_arms_five_minutes_later_and_keeps_repeat_schedule() {
    let mut m = manager();
    // Monday 2025-01-06, every weekday.
    let alarm = m.add_alarm(alarm_at(7, 0, &[1, 2, 3, 4, 5]), at(6, 6, 0));
    deliver_due(&mut m, at(6, 7, 0));

    let t = at(6, 7, 0) + Duration::seconds(30);
    let until = m.snooze(alarm.id(), t).unwrap();
    assert_eq!(until, t + Duration::minutes(5));
    assert_eq!(m.firing_state(alarm.id()), FiringState::Snoozed);
    assert_eq!(
        m.sink_mut().fire_at(&TriggerKey::snooze(alarm.id())),
        Some(until)
    );
    assert!(!m
        .sink_mut()
        .is_pending(&TriggerKey::reannounce(alarm.id())));
    // Regular schedule still points at Tuesday.
    assert_eq!(m.next_fire(alarm.id()), Some(at(7, 7, 0)));

    let events = deliver_due(&mut m, until);
    assert!(events.iter().any(|e| matches!(
        e,
        AlarmEvent::AlarmFired { trigger: TriggerKind::Snooze, .. }
    )));
    assert_eq!(m.firing_state(alarm.id()), FiringState::Firing);
    assert_eq!(m.next_fire(alarm.id()), Some(at(7, 7, 0)));
}

#[test]
fn test_snoozed_one_shot_fires_again_but_stays_disabled() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    deliver_due(&mut m, at(6, 7, 0));
    let until = m.snooze(alarm.id(), at(6, 7, 0)).unwrap();

    let events = deliver_due(&mut m, until);
    assert!(fired(&events, alarm.id()));
    assert!(!m.alarm(alarm.id()).unwrap().is_enabled);

    m.dismiss(alarm.id(), until).unwrap();
    assert_eq!(m.firing_state(alarm.id()), FiringState::Dismissed);
    assert!(m.pending_triggers().is_empty());
}

#[test]
fn test_dismiss_cancels_reannouncements() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    deliver_due(&mut m, at(6, 7, 0));

    let mut now = at(6, 7, 0);
    for _ in 0..3 {
        now += Duration::seconds(2);
        let events = deliver_due(&mut m, now);
        assert!(matches!(
            events.as_slice(),
            [AlarmEvent::AlarmReannounced { .. }]
        ));
    }
    m.dismiss(alarm.id(), now).unwrap();
    assert!(deliver_due(&mut m, now + Duration::minutes(10)).is_empty());
}

#[test]
fn test_early_delivery_is_rearmed_not_fired() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    let key = TriggerKey::alarm(alarm.id());
    assert!(m.handle_delivery(key, at(6, 6, 30)).is_none());
    assert_eq!(m.firing_state(alarm.id()), FiringState::Idle);
    assert_eq!(m.sink_mut().fire_at(&key), Some(at(6, 7, 0)));
    assert!(fired(&deliver_due(&mut m, at(6, 7, 0)), alarm.id()));
}

#[test]
fn test_fire_while_firing_restarts_session() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[0, 1, 2, 3, 4, 5, 6]), at(6, 6, 0));
    deliver_due(&mut m, at(6, 7, 0));
    let mut now = at(6, 7, 0);
    for _ in 0..2 {
        now += Duration::seconds(2);
        deliver_due(&mut m, now);
    }
    assert_eq!(m.firing_session(alarm.id()).unwrap().attempts(), 2);

    // Nobody dismissed; the next day's occurrence arrives.
    let next = m.next_fire(alarm.id()).unwrap();
    let events: Vec<_> = m
        .handle_delivery(TriggerKey::alarm(alarm.id()), next)
        .into_iter()
        .collect();
    assert!(fired(&events, alarm.id()));
    let session = m.firing_session(alarm.id()).unwrap();
    assert_eq!(session.attempts(), 0);
    assert_eq!(session.started_at(), next);
}

#[test]
fn test_alarms_survive_restart() {
    let persistence = MemoryPersistence::new();
    let id = {
        let mut m = manager_with(persistence.clone());
        let alarm = m.add_alarm(alarm_at(6, 45, &[1, 3, 5]), at(6, 6, 0));
        m.add_alarm(alarm_at(9, 0, &[]), at(6, 6, 0));
        alarm.id()
    };

    let mut restarted = manager_with(persistence);
    assert_eq!(restarted.list_alarms().len(), 2);
    assert_eq!(restarted.list_alarms()[0].id(), id);
    assert_eq!(restarted.arm_all(at(6, 12, 0)), 2);
    assert_eq!(restarted.next_fire(id), Some(at(8, 6, 45)));
}

#[test]
fn test_persistence_failure_is_not_fatal() {
    let persistence = MemoryPersistence::new();
    persistence.set_fail_saves(true);
    let mut m = manager_with(persistence.clone());
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    assert_eq!(m.list_alarms().len(), 1);
    assert!(m.next_fire(alarm.id()).is_some());
    assert!(persistence.raw().is_none());
}

#[test]
fn test_update_rearms_enabled_alarm() {
    let mut m = manager();
    let alarm = m.add_alarm(alarm_at(7, 0, &[]), at(6, 6, 0));
    let updated = m
        .update_alarm(alarm.id(), alarm_at(8, 30, &[2]), at(6, 6, 0))
        .unwrap();
    assert_eq!(updated.id(), alarm.id());
    assert_eq!(updated.label, "Wake up");
    assert_eq!(m.next_fire(alarm.id()), Some(at(7, 8, 30)));
    assert_eq!(m.pending_triggers().len(), 1);
}
