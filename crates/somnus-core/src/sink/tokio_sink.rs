use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::NotificationSink;
use crate::clock::Clock;
use crate::error::SinkError;
use crate::scheduler::TriggerKey;

/// Sink backed by tokio timers.
///
/// Each registration is a spawned task that sleeps until `fire_at` and then
/// sends its key on the delivery channel. Cancelling aborts the task. The
/// `repeats` flag is informational: the engine re-arms repeating alarms
/// itself after each fire.
#[derive(Debug)]
pub struct TokioSink {
    timers: HashMap<TriggerKey, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<TriggerKey>,
    clock: Clock,
}

impl TokioSink {
    /// Create the sink and the receiver its deliveries arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TriggerKey>) {
        Self::with_clock(Clock::System)
    }

    /// Like [`new`](Self::new), measuring delays against `clock`.
    pub fn with_clock(clock: Clock) -> (Self, mpsc::UnboundedReceiver<TriggerKey>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: HashMap::new(),
                tx,
                clock,
            },
            rx,
        )
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn armed_count(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}

impl NotificationSink for TokioSink {
    fn schedule(
        &mut self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
    ) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|e| SinkError::Rejected {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        self.timers.retain(|_, h| !h.is_finished());
        if let Some(previous) = self.timers.remove(key) {
            previous.abort();
        }

        let delay = (fire_at - self.clock.now()).to_std().unwrap_or_default();
        debug!(%key, %fire_at, repeats, ?delay, "arming timer");
        let tx = self.tx.clone();
        let key = *key;
        let timer = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(key);
        });
        self.timers.insert(key, timer);
        Ok(())
    }

    fn cancel(&mut self, key: &TriggerKey) {
        if let Some(timer) = self.timers.remove(key) {
            timer.abort();
        }
    }
}

impl Drop for TokioSink {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}
