//! TOML-based application configuration.
//!
//! Stores the tunables of the firing engine:
//! - Snooze length
//! - Re-announcement interval and attempt cap
//! - Quiz gate on/off and question count
//! - Display time format
//!
//! Configuration is stored at `~/.config/somnus/config.toml`.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::firing::{AlarmSettings, ReannouncePolicy};

/// Snooze and re-announcement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmsConfig {
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    #[serde(default = "default_reannounce_interval_secs")]
    pub reannounce_interval_secs: u32,
    #[serde(default = "default_max_reannouncements")]
    pub max_reannouncements: u32,
}

/// Dismissal challenge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_questions")]
    pub questions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/somnus/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub alarms: AlarmsConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_snooze_minutes() -> u32 {
    5
}
fn default_reannounce_interval_secs() -> u32 {
    2
}
fn default_max_reannouncements() -> u32 {
    150
}
fn default_true() -> bool {
    true
}
fn default_questions() -> u32 {
    3
}
fn default_time_format() -> String {
    "%H:%M".into()
}

/// `None` when chrono cannot render `format` for a bare time of day
/// (unknown specifiers, or date and zone fields such as `%Y` or `%Z`).
fn render_time(format: &str, time: NaiveTime) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", time.format(format)).ok()?;
    Some(out)
}

impl Default for AlarmsConfig {
    fn default() -> Self {
        Self {
            snooze_minutes: default_snooze_minutes(),
            reannounce_interval_secs: default_reannounce_interval_secs(),
            max_reannouncements: default_max_reannouncements(),
        }
    }
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            questions: default_questions(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u32>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot set a whole section".to_string()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the firing engine cannot work with.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.alarms.snooze_minutes == 0 {
            return Err(invalid("alarms.snooze_minutes", "must be at least 1"));
        }
        if self.alarms.reannounce_interval_secs == 0 {
            return Err(invalid("alarms.reannounce_interval_secs", "must be at least 1"));
        }
        if self.quiz.questions == 0 {
            return Err(invalid("quiz.questions", "must be at least 1"));
        }
        if render_time(&self.display.time_format, NaiveTime::default()).is_none() {
            return Err(invalid(
                "display.time_format",
                "must be a strftime format a time of day can fill",
            ));
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation. On error the config is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` pairs, for listing.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) {
            for (section, body) in sections {
                if let serde_json::Value::Object(fields) = body {
                    for (field, value) in fields {
                        let rendered = match value {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        out.push((format!("{section}.{field}"), rendered));
                    }
                }
            }
        }
        out
    }

    /// Engine settings derived from this config.
    pub fn alarm_settings(&self) -> AlarmSettings {
        AlarmSettings {
            snooze: Duration::minutes(i64::from(self.alarms.snooze_minutes)),
            reannounce: ReannouncePolicy {
                interval: Duration::seconds(i64::from(self.alarms.reannounce_interval_secs)),
                max_attempts: self.alarms.max_reannouncements,
            },
            quiz_questions: self
                .quiz
                .enabled
                .then_some(self.quiz.questions as usize),
        }
    }

    /// Render a time of day with `display.time_format`, falling back to
    /// `HH:MM` when the format needs fields a bare time does not have.
    pub fn format_time(&self, time: NaiveTime) -> String {
        render_time(&self.display.time_format, time)
            .unwrap_or_else(|| time.format("%H:%M").to_string())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
