pub mod alarm;
pub mod config;
pub mod run;

use somnus_core::{Alarm, AlarmId};

/// Resolve a full id or a unique id prefix.
pub(crate) fn resolve_id(alarms: &[Alarm], input: &str) -> Result<AlarmId, String> {
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err("alarm id is required".to_string());
    }
    let matches: Vec<AlarmId> = alarms
        .iter()
        .map(Alarm::id)
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(format!("no alarm matches '{input}'")),
        _ => Err(format!("'{input}' matches {} alarms", matches.len())),
    }
}
