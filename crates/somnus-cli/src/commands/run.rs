//! Foreground engine: alarms fire on tokio timers, events stream to stdout as
//! JSON lines, and stdin accepts commands for the firing alarm.

use chrono::{Local, TimeZone, Utc};
use somnus_core::runtime::SharedManager;
use somnus_core::{
    AlarmManager, AlarmPersistence, AlarmStore, Config, Database, KvPersistence,
    NotificationSink, Runtime,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::resolve_id;

type Manager = SharedManager<KvPersistence, Local>;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(serve())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = AlarmStore::load(KvPersistence::new(Database::open()?));
    let runtime = Runtime::start(store, config.alarm_settings(), Local);
    let mut events = runtime.subscribe().await;

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "failed to encode event"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    let input = tokio::spawn(read_commands(runtime.manager()));

    eprintln!(
        "somnus running; commands: list | firing | dismiss <id> | snooze <id> | answer <id> <n>"
    );
    let left = runtime
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    input.abort();
    printer.abort();
    if left > 0 {
        eprintln!("warning: {left} enabled alarm(s) will not sound until `somnus run` is started again");
    }
    Ok(())
}

async fn read_commands(manager: Manager) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = apply(&manager, &line).await {
                    eprintln!("error: {e}");
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        }
    }
}

async fn apply(manager: &Manager, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let mut m = manager.lock().await;
    let now = Utc::now();

    match words.as_slice() {
        [] => {}
        ["list"] => println!("{}", serde_json::to_string(m.list_alarms())?),
        ["firing"] => println!("{}", firing_report(&m)),
        ["dismiss", id] => {
            let id = resolve_id(m.list_alarms(), id)?;
            m.dismiss(id, now)?;
        }
        ["snooze", id] => {
            let id = resolve_id(m.list_alarms(), id)?;
            m.snooze(id, now)?;
        }
        ["answer", id, choice] => {
            let id = resolve_id(m.list_alarms(), id)?;
            let choice: u32 = choice.parse()?;
            let result = m.answer_quiz(id, choice)?;
            println!(
                "{}",
                serde_json::json!({ "alarm_id": id, "answer": result })
            );
        }
        _ => return Err(format!("unrecognised command: {line}").into()),
    }
    Ok(())
}

/// Firing alarms with the quiz question each one is waiting on.
fn firing_report<P, S, Tz>(m: &AlarmManager<P, S, Tz>) -> serde_json::Value
where
    P: AlarmPersistence,
    S: NotificationSink,
    Tz: TimeZone,
{
    let firing: Vec<serde_json::Value> = m
        .firing_alarms()
        .into_iter()
        .map(|id| {
            let label = m.alarm(id).map(|a| a.label.as_str()).unwrap_or_default();
            let question = m
                .firing_session(id)
                .and_then(|s| s.quiz())
                .and_then(|q| q.current_question())
                .map(|q| serde_json::json!({ "prompt": q.prompt(), "options": q.options }));
            serde_json::json!({ "alarm_id": id, "label": label, "question": question })
        })
        .collect();
    serde_json::Value::Array(firing)
}
