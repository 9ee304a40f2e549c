//! Ordered, persisted alarm collection.
//!
//! Every mutation writes the full collection through an
//! [`AlarmPersistence`] before returning. Persistence failures are logged and
//! swallowed: the in-memory collection is the source of truth for this run.

mod persistence;

pub use persistence::{AlarmPersistence, KvPersistence, MemoryPersistence};

use std::collections::HashSet;

use tracing::{error, warn};

use crate::alarm::{Alarm, AlarmId};

#[derive(Debug)]
pub struct AlarmStore<P> {
    alarms: Vec<Alarm>,
    persistence: P,
}

impl<P: AlarmPersistence> AlarmStore<P> {
    /// Load the persisted collection. Corrupt or unreadable data gives an
    /// empty store.
    pub fn load(persistence: P) -> Self {
        let mut alarms = match persistence.load() {
            Ok(alarms) => alarms,
            Err(e) => {
                warn!(error = %e, "discarding unreadable saved alarms");
                Vec::new()
            }
        };

        // Keep the last record for a repeated id, at the position of the first.
        let mut seen = HashSet::new();
        let mut deduped: Vec<Alarm> = Vec::with_capacity(alarms.len());
        for alarm in alarms.drain(..) {
            if seen.insert(alarm.id()) {
                deduped.push(alarm);
            } else if let Some(slot) = deduped.iter_mut().find(|a| a.id() == alarm.id()) {
                *slot = alarm;
            }
        }

        Self {
            alarms: deduped,
            persistence,
        }
    }

    pub fn list(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id() == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Append `alarm`, or replace the record with the same id in place.
    pub fn add(&mut self, alarm: Alarm) {
        match self.alarms.iter_mut().find(|a| a.id() == alarm.id()) {
            Some(existing) => *existing = alarm,
            None => self.alarms.push(alarm),
        }
        self.persist();
    }

    /// Mutate one alarm and return the result. Unknown ids change nothing.
    pub fn update<F>(&mut self, id: AlarmId, mutator: F) -> Option<Alarm>
    where
        F: FnOnce(&mut Alarm),
    {
        let alarm = self.alarms.iter_mut().find(|a| a.id() == id)?;
        mutator(alarm);
        let updated = alarm.clone();
        self.persist();
        Some(updated)
    }

    /// Remove an alarm. Unknown ids are a no-op.
    pub fn remove(&mut self, id: AlarmId) -> Option<Alarm> {
        let index = self.alarms.iter().position(|a| a.id() == id)?;
        let removed = self.alarms.remove(index);
        self.persist();
        Some(removed)
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.alarms) {
            error!(error = %e, count = self.alarms.len(), "failed to save alarms");
        }
    }
}
