use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::TaskStatus;
use crate::timer::TimerState;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_task_status(value: &str) -> Result<TaskStatus> {
    match value {
        "Not Started" => Ok(TaskStatus::NotStarted),
        "In Progress" => Ok(TaskStatus::InProgress),
        "Paused" => Ok(TaskStatus::Paused),
        "Completed" => Ok(TaskStatus::Completed),
        other => Err(anyhow!("unknown task status {other}")),
    }
}

pub fn parse_timer_state(value: &str) -> Result<TimerState> {
    match value {
        "Running" => Ok(TimerState::Running),
        "Paused" => Ok(TimerState::Paused),
        "Stopped" => Ok(TimerState::Stopped),
        other => Err(anyhow!("unknown timer state {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stored_timestamps_sort_like_instants() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(5);
        assert_eq!(format_datetime(&whole), "2024-05-01T10:00:00.000Z");
        assert!(format_datetime(&whole) < format_datetime(&later));
        assert_eq!(
            parse_datetime(&format_datetime(&later), "t").unwrap(),
            later
        );
    }

    #[test]
    fn idle_is_never_a_stored_state() {
        assert!(parse_timer_state("Idle").is_err());
        assert_eq!(parse_timer_state("Paused").unwrap(), TimerState::Paused);
        assert_eq!(
            parse_task_status("In Progress").unwrap(),
            TaskStatus::InProgress
        );
    }
}
