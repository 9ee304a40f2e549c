//! Notification sink seam.
//!
//! The sink is whatever stores scheduled triggers and wakes the process at
//! the right time (a platform notification centre, an OS timer, ...). It
//! delivers fires back to the engine keyed by [`TriggerKey`]; how it does
//! that is up to the implementation.

mod recording;
mod tokio_sink;

pub use recording::{RecordingSink, SinkCall};
pub use tokio_sink::TokioSink;

use chrono::{DateTime, Utc};

use crate::error::SinkError;
use crate::scheduler::TriggerKey;

/// Platform mechanism that stores triggers and delivers fire callbacks.
///
/// Registration is fire-and-forget: implementations must not block, and
/// callers treat an `Err` as "logged, alarm may not fire".
pub trait NotificationSink {
    /// Register (or replace) the trigger for `key`.
    fn schedule(
        &mut self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
    ) -> Result<(), SinkError>;

    /// Drop the trigger for `key`. Unknown keys are ignored.
    fn cancel(&mut self, key: &TriggerKey);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn schedule(
        &mut self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        repeats: bool,
    ) -> Result<(), SinkError> {
        (**self).schedule(key, fire_at, repeats)
    }

    fn cancel(&mut self, key: &TriggerKey) {
        (**self).cancel(key)
    }
}
