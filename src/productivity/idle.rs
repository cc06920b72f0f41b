use std::fmt::Display;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use crate::db::IntervalRecord;

use super::two_decimals;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdleReport {
    pub user_id: String,
    pub total_idle_minutes: u64,
    pub total_idle_hours: String,
    /// `"HH:MM - HH:MM"` per closed pause, in pause order.
    pub idle_spans: Vec<String>,
}

/// Each closed interval contributes its whole minutes; open intervals are
/// skipped.
pub fn summarize_idle<Tz>(user_id: &str, intervals: &[IntervalRecord], tz: &Tz) -> IdleReport
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut total_idle_minutes = 0u64;
    let mut idle_spans = Vec::new();

    for interval in intervals {
        let Some(resume_time) = interval.resume_time else {
            continue;
        };
        let millis = (resume_time - interval.pause_time).num_milliseconds().max(0);
        total_idle_minutes += (millis / 60_000) as u64;

        idle_spans.push(format!(
            "{} - {}",
            interval.pause_time.with_timezone(tz).format("%H:%M"),
            resume_time.with_timezone(tz).format("%H:%M")
        ));
    }

    IdleReport {
        user_id: user_id.to_string(),
        total_idle_minutes,
        total_idle_hours: two_decimals(total_idle_minutes, 60),
        idle_spans,
    }
}
