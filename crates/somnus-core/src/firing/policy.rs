//! Bounded re-announcement policy and engine tunables.
//!
//! OS-level delivery does not reliably hold the user's attention, so a
//! firing alarm re-announces itself every `interval`, at most
//! `max_attempts` times, until the user acts.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReannouncePolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReannouncePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::seconds(2),
            max_attempts: 150,
        }
    }
}

impl ReannouncePolicy {
    /// When the next attempt is due, or `None` once `attempts_made` hits the cap.
    pub fn next_at(&self, attempts_made: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (attempts_made < self.max_attempts).then(|| now + self.interval)
    }

    pub fn is_exhausted(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }
}

/// Everything the firing engine needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSettings {
    pub snooze: Duration,
    pub reannounce: ReannouncePolicy,
    /// Questions per dismissal quiz; `None` disables the quiz gate.
    pub quiz_questions: Option<usize>,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            snooze: Duration::minutes(5),
            reannounce: ReannouncePolicy::default(),
            quiz_questions: Some(3),
        }
    }
}
