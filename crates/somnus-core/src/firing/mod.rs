//! Per-alarm firing and dismissal state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Firing -> (Dismissed | Snoozed)
//! ```
//!
//! A session is opened when a trigger is delivered and stays `Firing`
//! until the user dismisses or snoozes. Like the rest of the engine it has no
//! internal timers; the re-announcement clock is driven by the notification
//! sink through [`AlarmManager`](crate::manager::AlarmManager).

mod policy;

pub use policy::{AlarmSettings, ReannouncePolicy};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;
use crate::quiz::{MathQuiz, QuizAnswer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiringState {
    Idle,
    Firing,
    Dismissed,
    Snoozed,
}

/// Firing session of a single alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiringSession {
    alarm_id: AlarmId,
    state: FiringState,
    started_at: DateTime<Utc>,
    /// Re-announcements made so far in this session.
    attempts: u32,
    quiz: Option<MathQuiz>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    snoozed_until: Option<DateTime<Utc>>,
}

impl FiringSession {
    pub fn start(alarm_id: AlarmId, at: DateTime<Utc>, quiz: Option<MathQuiz>) -> Self {
        Self {
            alarm_id,
            state: FiringState::Firing,
            started_at: at,
            attempts: 0,
            quiz,
            ended_at: None,
            snoozed_until: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn alarm_id(&self) -> AlarmId {
        self.alarm_id
    }

    pub fn state(&self) -> FiringState {
        self.state
    }

    pub fn is_firing(&self) -> bool {
        self.state == FiringState::Firing
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn quiz(&self) -> Option<&MathQuiz> {
        self.quiz.as_ref()
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn snoozed_until(&self) -> Option<DateTime<Utc>> {
        self.snoozed_until
    }

    /// Dismissal is allowed once the quiz (if any) is solved.
    pub fn can_dismiss(&self) -> bool {
        self.quiz.as_ref().map(MathQuiz::is_solved).unwrap_or(true)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Count one re-announcement. Returns the attempt number, or `None` when
    /// the session is no longer firing or the policy cap is reached.
    pub fn record_reannounce(&mut self, policy: &ReannouncePolicy) -> Option<u32> {
        if !self.is_firing() || policy.is_exhausted(self.attempts) {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    /// Submit a quiz answer. Without a quiz the session is trivially solved.
    pub fn answer(&mut self, choice: u32) -> Option<QuizAnswer> {
        if !self.is_firing() {
            return None;
        }
        Some(match self.quiz.as_mut() {
            Some(quiz) => quiz.answer(choice),
            None => QuizAnswer::Solved,
        })
    }

    /// `Firing -> Dismissed`. Returns false if not firing or still gated.
    pub fn dismiss(&mut self, at: DateTime<Utc>) -> bool {
        if !self.is_firing() || !self.can_dismiss() {
            return false;
        }
        self.state = FiringState::Dismissed;
        self.ended_at = Some(at);
        true
    }

    /// `Firing -> Snoozed`. Returns false if not firing.
    pub fn snooze(&mut self, at: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        if !self.is_firing() {
            return false;
        }
        self.state = FiringState::Snoozed;
        self.ended_at = Some(at);
        self.snoozed_until = Some(until);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn policy(max_attempts: u32) -> ReannouncePolicy {
        ReannouncePolicy {
            interval: Duration::seconds(2),
            max_attempts,
        }
    }

    #[test]
    fn reannounce_is_bounded() {
        let mut session = FiringSession::start(AlarmId::new(), Utc::now(), None);
        let policy = policy(2);
        assert_eq!(session.record_reannounce(&policy), Some(1));
        assert_eq!(session.record_reannounce(&policy), Some(2));
        assert_eq!(session.record_reannounce(&policy), None);
        assert_eq!(session.attempts(), 2);
        assert!(session.is_firing());
    }

    #[test]
    fn dismiss_without_quiz() {
        let now = Utc::now();
        let mut session = FiringSession::start(AlarmId::new(), now, None);
        assert!(session.can_dismiss());
        assert!(session.dismiss(now));
        assert_eq!(session.state(), FiringState::Dismissed);
        assert_eq!(session.ended_at(), Some(now));
        // Terminal: no further transitions or re-announcements.
        assert!(!session.dismiss(now));
        assert!(!session.snooze(now, now));
        assert_eq!(session.record_reannounce(&policy(10)), None);
    }

    #[test]
    fn quiz_gates_dismissal() {
        let now = Utc::now();
        let quiz = MathQuiz::generate(&mut Pcg64::seed_from_u64(3), 1);
        let answer = quiz.questions()[0].answer();
        let mut session = FiringSession::start(AlarmId::new(), now, Some(quiz));

        assert!(!session.can_dismiss());
        assert!(!session.dismiss(now));
        assert!(session.is_firing());

        assert_eq!(session.answer(answer + 50), Some(QuizAnswer::Incorrect));
        assert_eq!(session.answer(answer), Some(QuizAnswer::Solved));
        assert!(session.dismiss(now));
    }

    #[test]
    fn snooze_records_deadline() {
        let now = Utc::now();
        let until = now + Duration::minutes(5);
        let mut session = FiringSession::start(AlarmId::new(), now, None);
        assert!(session.snooze(now, until));
        assert_eq!(session.state(), FiringState::Snoozed);
        assert_eq!(session.snoozed_until(), Some(until));
        assert_eq!(session.answer(1), None);
    }
}
