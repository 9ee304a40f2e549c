use chrono::{DateTime, Local, Utc};
use clap::Subcommand;
use serde::Serialize;
use somnus_core::{
    Alarm, AlarmManager, AlarmSpec, AlarmStore, Config, Database, KvPersistence, NewAlarm,
    RecordingSink,
};

use super::resolve_id;

type CliManager = AlarmManager<KvPersistence, RecordingSink, Local>;

#[derive(Subcommand)]
pub enum AlarmAction {
    /// List alarms as JSON
    List,
    /// Add an alarm
    Add {
        /// Time of day (HH:MM, 24-hour)
        time: String,
        /// Free-text label
        #[arg(long, default_value = "")]
        label: String,
        /// Repeat days, e.g. "mon,wed,fri" or "1,3,5" (0 = Sunday)
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
    },
    /// Change time, label or repeat days of an alarm
    Edit {
        /// Alarm id or unique prefix
        id: String,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        label: Option<String>,
        /// Replacement repeat days; pass "" for a one-shot alarm
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<String>>,
    },
    /// Enable or disable an alarm
    Toggle {
        /// Alarm id or unique prefix
        id: String,
    },
    /// Delete an alarm
    Delete {
        /// Alarm id or unique prefix
        id: String,
    },
    /// Print the next alarm to fire as JSON
    Next,
}

#[derive(Serialize)]
struct AlarmRow<'a> {
    #[serde(flatten)]
    alarm: &'a Alarm,
    days: String,
    next_fire: Option<DateTime<Local>>,
}

fn open_manager(config: &Config) -> Result<CliManager, Box<dyn std::error::Error>> {
    let store = AlarmStore::load(KvPersistence::new(Database::open()?));
    Ok(AlarmManager::new(
        store,
        RecordingSink::new(),
        config.alarm_settings(),
        Local,
    ))
}

fn describe(alarm: &Alarm, config: &Config) -> String {
    let time = config.format_time(alarm.time);
    let state = if alarm.is_enabled { "on" } else { "off" };
    if alarm.label.is_empty() {
        format!("{time} ({}) [{state}] {}", alarm.repeat_days, alarm.id())
    } else {
        format!(
            "{time} {} ({}) [{state}] {}",
            alarm.label,
            alarm.repeat_days,
            alarm.id()
        )
    }
}

pub fn run(action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut manager = open_manager(&config)?;
    let now = Utc::now();

    match action {
        AlarmAction::List => {
            manager.arm_all(now);
            let rows: Vec<AlarmRow<'_>> = manager
                .list_alarms()
                .iter()
                .map(|alarm| AlarmRow {
                    alarm,
                    days: alarm.repeat_days.to_string(),
                    next_fire: manager
                        .next_fire(alarm.id())
                        .map(|at| at.with_timezone(&Local)),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        AlarmAction::Add { time, label, days } => {
            let spec = AlarmSpec { time, label, days };
            let alarm = manager.add_alarm(spec.parse()?, now);
            println!("Alarm added: {}", describe(&alarm, &config));
        }
        AlarmAction::Edit {
            id,
            time,
            label,
            days,
        } => {
            let id = resolve_id(manager.list_alarms(), &id)?;
            let current = manager
                .alarm(id)
                .cloned()
                .ok_or_else(|| format!("no alarm matches '{id}'"))?;
            let time = match time {
                Some(raw) => somnus_core::alarm::parse_time(&raw)?,
                None => current.time,
            };
            let repeat_days = match days {
                Some(tokens) => {
                    AlarmSpec {
                        time: "00:00".to_string(),
                        label: String::new(),
                        days: tokens,
                    }
                    .parse()?
                    .repeat_days
                }
                None => current.repeat_days,
            };
            let label = label.unwrap_or(current.label);
            let alarm = manager.update_alarm(id, NewAlarm::new(time, label, repeat_days), now)?;
            println!("Alarm updated: {}", describe(&alarm, &config));
        }
        AlarmAction::Toggle { id } => {
            let id = resolve_id(manager.list_alarms(), &id)?;
            let alarm = manager.toggle_alarm(id, now)?;
            println!("Alarm toggled: {}", describe(&alarm, &config));
        }
        AlarmAction::Delete { id } => {
            let id = resolve_id(manager.list_alarms(), &id)?;
            if let Some(alarm) = manager.delete_alarm(id, now) {
                println!("Alarm deleted: {}", describe(&alarm, &config));
            }
        }
        AlarmAction::Next => {
            manager.arm_all(now);
            let next = manager
                .list_alarms()
                .iter()
                .filter_map(|alarm| manager.next_fire(alarm.id()).map(|at| (at, alarm)))
                .min_by_key(|(at, _)| *at)
                .map(|(at, alarm)| AlarmRow {
                    alarm,
                    days: alarm.repeat_days.to_string(),
                    next_fire: Some(at.with_timezone(&Local)),
                });
            println!("{}", serde_json::to_string_pretty(&next)?);
        }
    }
    Ok(())
}
