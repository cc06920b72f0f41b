use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Reporting window, anchored at the calendar boundary that contains "now".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductivityRange {
    Daily,
    Weekly,
    Monthly,
}

impl ProductivityRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductivityRange::Daily => "daily",
            ProductivityRange::Weekly => "weekly",
            ProductivityRange::Monthly => "monthly",
        }
    }

    /// Midnight starting the window, in `now`'s timezone: today, the most
    /// recent Sunday, or the first of the month.
    pub fn window_start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            ProductivityRange::Daily => today,
            ProductivityRange::Weekly => {
                today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
            }
            ProductivityRange::Monthly => today.with_day(1).unwrap_or(today),
        };

        let midnight = first_day.and_time(NaiveTime::MIN);
        now.timezone()
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }
}

impl FromStr for ProductivityRange {
    type Err = TimerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "daily" => Ok(ProductivityRange::Daily),
            "weekly" => Ok(ProductivityRange::Weekly),
            "monthly" => Ok(ProductivityRange::Monthly),
            other => Err(TimerError::InvalidArgument {
                name: "range",
                value: other.to_string(),
            }),
        }
    }
}
