//! Next-occurrence computation.
//!
//! The candidate is `now`'s local date at the alarm's time of day. If that
//! is not strictly after `now`, move to the next day; for repeating alarms
//! keep moving day by day until the weekday is in the repeat set.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::alarm::RepeatDays;

/// Upper bound on the minutes probed to step over a DST gap.
const MAX_GAP_MINUTES: u32 = 24 * 60;

/// Next fire time of an alarm at `time` on `days`, strictly after `now`.
pub fn next_occurrence<Tz: TimeZone>(
    now: &DateTime<Tz>,
    time: NaiveTime,
    days: RepeatDays,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    if resolve_local(&tz, date.and_time(time)) <= *now {
        date = next_day(date);
    }
    if !days.is_empty() {
        // Bounded: a non-empty set matches within seven days.
        for _ in 0..7 {
            if days.contains_weekday(date.weekday()) {
                break;
            }
            date = next_day(date);
        }
    }
    resolve_local(&tz, date.and_time(time))
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(NaiveDate::MAX)
}

/// Map a local wall-clock time onto the zone. Ambiguous times take the
/// earliest instant; times inside a DST gap move to the first minute after it.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return dt;
    }
    let mut probe = local;
    for _ in 0..MAX_GAP_MINUTES {
        probe += chrono::Duration::minutes(1);
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt;
        }
    }
    tz.from_utc_datetime(&local)
}
