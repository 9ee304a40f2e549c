//! Wall-clock source for the tokio runtime.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Where [`Runtime`](crate::Runtime) and [`TokioSink`](crate::TokioSink)
/// read the current time.
///
/// `Tokio` anchors a UTC instant to tokio's monotonic clock, so it advances
/// with `tokio::time` (including a paused test clock) instead of the system
/// clock.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Tokio { utc: DateTime<Utc>, instant: Instant },
}

impl Clock {
    /// Anchor at the current system time. Must be called within a tokio
    /// runtime.
    pub fn tokio() -> Self {
        Clock::Tokio {
            utc: Utc::now(),
            instant: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Tokio { utc, instant } => {
                let elapsed = chrono::Duration::from_std(instant.elapsed()).unwrap_or_default();
                *utc + elapsed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = Clock::tokio();
        let start = clock.now();
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }

    #[test]
    fn system_clock_is_wall_time() {
        let before = Utc::now();
        let now = Clock::System.now();
        assert!(now >= before);
    }
}
