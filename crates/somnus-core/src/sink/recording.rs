use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::NotificationSink;
use crate::error::SinkError;
use crate::scheduler::TriggerKey;

/// One call made against a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Schedule {
        key: TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
    },
    Cancel {
        key: TriggerKey,
    },
}

/// In-process sink that records registrations instead of waking anything.
///
/// Drive it by asking for the triggers that are due ([`take_due`](Self::take_due))
/// and handing them to the engine. It can also be switched to reject every
/// registration to exercise the best-effort failure path.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pending: BTreeMap<TriggerKey, (DateTime<Utc>, bool)>,
    calls: Vec<SinkCall>,
    rejecting: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rejecting(&mut self, rejecting: bool) {
        self.rejecting = rejecting;
    }

    pub fn is_pending(&self, key: &TriggerKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn fire_at(&self, key: &TriggerKey) -> Option<DateTime<Utc>> {
        self.pending.get(key).map(|(at, _)| *at)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    /// Remove and return every trigger due at `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<TriggerKey> {
        let mut due: Vec<(DateTime<Utc>, TriggerKey)> = self
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(key, (at, _))| (*at, *key))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Earliest pending fire time, if any.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|(at, _)| *at).min()
    }
}

impl NotificationSink for RecordingSink {
    fn schedule(
        &mut self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
    ) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Schedule {
            key: *key,
            fire_at,
            repeats,
        });
        if self.rejecting {
            return Err(SinkError::Rejected {
                key: key.to_string(),
                reason: "sink is rejecting registrations".to_string(),
            });
        }
        self.pending.insert(*key, (fire_at, repeats));
        Ok(())
    }

    fn cancel(&mut self, key: &TriggerKey) {
        self.calls.push(SinkCall::Cancel { key: *key });
        self.pending.remove(key);
    }
}
