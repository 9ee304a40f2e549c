use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::alarm::Alarm;
use crate::error::PersistenceError;
use crate::storage::Database;

/// Where the alarm collection lives between runs.
///
/// The whole collection is written on every mutation, so implementations only
/// need a single blob slot.
pub trait AlarmPersistence {
    fn save(&self, alarms: &[Alarm]) -> Result<(), PersistenceError>;

    /// Load the collection. A missing blob is an empty collection, not an error.
    fn load(&self) -> Result<Vec<Alarm>, PersistenceError>;
}

impl<P: AlarmPersistence + ?Sized> AlarmPersistence for Box<P> {
    fn save(&self, alarms: &[Alarm]) -> Result<(), PersistenceError> {
        (**self).save(alarms)
    }

    fn load(&self) -> Result<Vec<Alarm>, PersistenceError> {
        (**self).load()
    }
}

/// JSON blob stored in the `kv` table of a [`Database`].
#[derive(Debug)]
pub struct KvPersistence {
    db: Database,
    key: String,
}

impl KvPersistence {
    pub const DEFAULT_KEY: &'static str = "saved_alarms";

    pub fn new(db: Database) -> Self {
        Self::with_key(db, Self::DEFAULT_KEY)
    }

    pub fn with_key(db: Database, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl AlarmPersistence for KvPersistence {
    fn save(&self, alarms: &[Alarm]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(alarms)?;
        self.db.kv_set(&self.key, &json)?;
        Ok(())
    }

    fn load(&self) -> Result<Vec<Alarm>, PersistenceError> {
        match self.db.kv_get(&self.key)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Shared in-memory blob. Clones see the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    blob: Arc<Mutex<Option<String>>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a raw blob, which need not be valid JSON.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let persistence = Self::default();
        *persistence.lock() = Some(raw.into());
        persistence
    }

    pub fn raw(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Make every subsequent `save` fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.blob
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AlarmPersistence for MemoryPersistence {
    fn save(&self, alarms: &[Alarm]) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory store is refusing writes".to_string(),
            ));
        }
        let json = serde_json::to_string(alarms)?;
        *self.lock() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Vec<Alarm>, PersistenceError> {
        match self.lock().as_deref() {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Vec::new()),
        }
    }
}
