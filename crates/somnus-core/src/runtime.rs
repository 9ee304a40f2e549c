//! Async driver: one lock around the manager, one delivery loop.

use std::future::Future;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::events::AlarmEvent;
use crate::firing::AlarmSettings;
use crate::manager::AlarmManager;
use crate::scheduler::TriggerKey;
use crate::sink::TokioSink;
use crate::store::{AlarmPersistence, AlarmStore};

pub type SharedManager<P, Tz = Local> = Arc<Mutex<AlarmManager<P, TokioSink, Tz>>>;

/// Runs an [`AlarmManager`] on tokio timers.
///
/// UI commands lock [`manager`](Self::manager); sink deliveries are applied
/// by [`run_until`](Self::run_until) under the same lock.
pub struct Runtime<P, Tz = Local> {
    manager: SharedManager<P, Tz>,
    deliveries: mpsc::UnboundedReceiver<TriggerKey>,
    clock: Clock,
}

impl<P, Tz> Runtime<P, Tz>
where
    P: AlarmPersistence,
    Tz: TimeZone,
{
    /// Build the manager on a [`TokioSink`] and arm every enabled alarm.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: AlarmStore<P>, settings: AlarmSettings, tz: Tz) -> Self {
        Self::start_with_clock(store, settings, tz, Clock::System)
    }

    /// Like [`start`](Self::start), with timers and deliveries timed by
    /// `clock`.
    pub fn start_with_clock(
        store: AlarmStore<P>,
        settings: AlarmSettings,
        tz: Tz,
        clock: Clock,
    ) -> Self {
        let (sink, deliveries) = TokioSink::with_clock(clock);
        let mut manager = AlarmManager::new(store, sink, settings, tz);
        let armed = manager.arm_all(clock.now());
        info!(armed, alarms = manager.list_alarms().len(), "alarm engine started");
        Self {
            manager: Arc::new(Mutex::new(manager)),
            deliveries,
            clock,
        }
    }


    pub fn manager(&self) -> SharedManager<P, Tz> {
        Arc::clone(&self.manager)
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.manager.lock().await.subscribe()
    }

    /// Apply deliveries until `shutdown` resolves. Returns the number of
    /// enabled alarms left behind, which will not sound until restarted.
    pub async fn run_until<F>(mut self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                delivered = self.deliveries.recv() => match delivered {
                    Some(key) => {
                        self.manager.lock().await.handle_delivery(key, self.clock.now());
                    }
                    None => break,
                },
            }
        }

        let enabled = self.manager.lock().await.enabled_count();
        if enabled > 0 {
            warn!(enabled, "alarm engine stopped; enabled alarms will not sound until it is started again");
        }
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{NewAlarm, RepeatDays};
    use crate::store::MemoryPersistence;
    use chrono::{NaiveTime, Timelike, Utc};

    fn new_alarm(days: RepeatDays) -> NewAlarm {
        NewAlarm::new(NaiveTime::from_hms_opt(7, 0, 0).unwrap(), "", days)
    }

    #[tokio::test]
    async fn start_arms_enabled_alarms() {
        let persistence = MemoryPersistence::new();
        {
            let mut store = AlarmStore::load(persistence.clone());
            store.add(crate::alarm::Alarm::new(new_alarm(RepeatDays::EVERY_DAY)));
            let mut disabled = crate::alarm::Alarm::new(new_alarm(RepeatDays::NONE));
            disabled.is_enabled = false;
            store.add(disabled);
        }

        let runtime = Runtime::start(
            AlarmStore::load(persistence),
            AlarmSettings::default(),
            Utc,
        );
        let manager = runtime.manager();
        let guard = manager.lock().await;
        assert_eq!(guard.scheduler().sink().armed_count(), 1);
        assert_eq!(guard.pending_triggers().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_reports_enabled_alarms() {
        let runtime = Runtime::start(
            AlarmStore::load(MemoryPersistence::new()),
            AlarmSettings::default(),
            Utc,
        );
        runtime
            .manager()
            .lock()
            .await
            .add_alarm(new_alarm(RepeatDays::NONE), Utc::now());

        let left = runtime.run_until(async {}).await;
        assert_eq!(left, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn due_alarm_fires_then_reannounces() {
        let clock = Clock::tokio();
        let settings = AlarmSettings {
            quiz_questions: None,
            ..AlarmSettings::default()
        };
        let runtime = Runtime::start_with_clock(
            AlarmStore::load(MemoryPersistence::new()),
            settings,
            Utc,
            clock,
        );
        let mut events = runtime.subscribe().await;

        let soon = clock.now() + chrono::Duration::minutes(2);
        let time = NaiveTime::from_hms_opt(soon.hour(), soon.minute(), 0).unwrap();
        let (id, fire_at) = {
            let manager = runtime.manager();
            let mut guard = manager.lock().await;
            let alarm = guard.add_alarm(NewAlarm::new(time, "wake", RepeatDays::NONE), clock.now());
            (alarm.id(), guard.next_fire(alarm.id()).unwrap())
        };
        assert!(fire_at > clock.now());

        let wait = (fire_at + chrono::Duration::seconds(3) - clock.now())
            .to_std()
            .unwrap();
        let left = runtime.run_until(tokio::time::sleep(wait)).await;
        assert_eq!(left, 0);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        let fired = seen
            .iter()
            .position(|e| matches!(e, AlarmEvent::AlarmFired { alarm_id, at, .. } if *alarm_id == id && *at >= fire_at))
            .expect("alarm should fire");
        let reannounced = seen
            .iter()
            .position(|e| matches!(e, AlarmEvent::AlarmReannounced { alarm_id, attempt: 1, .. } if *alarm_id == id))
            .expect("alarm should be re-announced");
        assert!(fired < reannounced);
    }
}
