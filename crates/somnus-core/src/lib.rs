//! # Somnus Core Library
//!
//! Alarm clock engine: a persisted alarm collection, a scheduler that turns
//! alarms into absolute fire times, and a firing state machine that keeps an
//! alarm announcing itself until the user dismisses or snoozes it. The
//! `somnus` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Store**: ordered alarm collection, saved in full on every mutation
//!   through an [`AlarmPersistence`] backend (SQLite `kv` table or memory)
//! - **Scheduler**: next-occurrence computation and trigger registration with
//!   a [`NotificationSink`]
//! - **Firing**: per-alarm `Idle -> Firing -> Dismissed | Snoozed` sessions
//!   with bounded re-announcement and an optional math quiz gate
//! - **Runtime**: tokio driver that owns the manager behind a single lock
//!
//! ## Key Components
//!
//! - [`AlarmManager`]: composition root and UI-facing API
//! - [`AlarmEvent`]: broadcast stream of state changes
//! - [`Config`]: TOML configuration
//! - [`Database`]: SQLite key-value storage

pub mod alarm;
pub mod clock;
pub mod error;
pub mod events;
pub mod firing;
pub mod manager;
pub mod quiz;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod storage;
pub mod store;

pub use alarm::{Alarm, AlarmId, AlarmSpec, NewAlarm, RepeatDays};
pub use clock::Clock;
pub use error::{
    ConfigError, CoreError, DatabaseError, PersistenceError, Result, SinkError, ValidationError,
};
pub use events::AlarmEvent;
pub use firing::{AlarmSettings, FiringSession, FiringState, ReannouncePolicy};
pub use manager::AlarmManager;
pub use quiz::{MathQuiz, QuizAnswer, QuizQuestion};
pub use runtime::Runtime;
pub use scheduler::{next_occurrence, Delivery, ScheduledTrigger, Scheduler, TriggerKey, TriggerKind};
pub use sink::{NotificationSink, RecordingSink, TokioSink};
pub use storage::{Config, Database};
pub use store::{AlarmPersistence, AlarmStore, KvPersistence, MemoryPersistence};
