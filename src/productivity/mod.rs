//! Productivity reports over stored timers.
//!
//! `report` sums accumulated timer durations inside a calendar window and
//! compares them with an expected-hours baseline; `idle` summarizes the
//! closed pause spans of a user's timers.

mod idle;
mod range;

pub use idle::{summarize_idle, IdleReport};
pub use range::ProductivityRange;

use chrono::{DateTime, Local, TimeZone};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    db::TimerRecord,
    error::TimerResult,
    timer::TimerController,
};

/// Correction applied to the summed total before it is reported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductivityAdjustment {
    #[default]
    None,
    /// Subtract a flat number of minutes once the total exceeds it.
    FlatOffset { minutes: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProductivitySettings {
    pub hours_per_day: u64,
    pub days_per_week: u64,
    pub days_per_month: u64,
    pub adjustment: ProductivityAdjustment,
}

impl Default for ProductivitySettings {
    fn default() -> Self {
        Self {
            hours_per_day: 8,
            days_per_week: 5,
            days_per_month: 20,
            adjustment: ProductivityAdjustment::None,
        }
    }
}

impl ProductivitySettings {
    pub fn expected_seconds(&self, range: ProductivityRange) -> u64 {
        let days = match range {
            ProductivityRange::Daily => 1,
            ProductivityRange::Weekly => self.days_per_week,
            ProductivityRange::Monthly => self.days_per_month,
        };
        self.hours_per_day * 3600 * days
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductivityReport {
    pub total_minutes: u64,
    /// Hours with two decimals, e.g. `"1.50"`.
    pub total_hours: String,
    /// `"{h}h {m}m"`
    pub readable_time: String,
    pub tasks_count: usize,
    /// Percentage of the baseline with two decimals, e.g. `"18.75"`.
    pub productivity_percent: String,
}

/// Build a report from the timers that fall in `range`.
pub fn summarize(
    timers: &[TimerRecord],
    range: ProductivityRange,
    settings: &ProductivitySettings,
) -> ProductivityReport {
    let raw_secs: u64 = timers.iter().map(|timer| timer.duration).sum();

    let total_secs = match settings.adjustment {
        ProductivityAdjustment::None => raw_secs,
        ProductivityAdjustment::FlatOffset { minutes } => {
            if raw_secs / 60 > minutes {
                raw_secs - minutes * 60
            } else {
                raw_secs
            }
        }
    };

    let total_minutes = total_secs / 60;
    let expected = settings.expected_seconds(range).max(1);

    ProductivityReport {
        total_minutes,
        total_hours: two_decimals(total_minutes, 60),
        readable_time: format!("{}h {}m", total_minutes / 60, total_minutes % 60),
        tasks_count: timers.len(),
        productivity_percent: two_decimals(total_secs * 100, expected),
    }
}

/// `numerator / denominator` with two decimals, rounding halves up.
pub(crate) fn two_decimals(numerator: u64, denominator: u64) -> String {
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator.max(1));
    let hundredths = (numerator * 200 + denominator) / (2 * denominator);
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}

impl TimerController {
    pub async fn productivity(
        &self,
        user_id: &str,
        range: &str,
        settings: &ProductivitySettings,
    ) -> TimerResult<ProductivityReport> {
        let range: ProductivityRange = range.parse()?;
        let now = self.now().with_timezone(&Local);
        self.productivity_in(user_id, range, now, settings).await
    }

    /// Report for the window containing `now`, with calendar boundaries
    /// taken in `now`'s timezone.
    pub async fn productivity_in<Tz: TimeZone>(
        &self,
        user_id: &str,
        range: ProductivityRange,
        now: DateTime<Tz>,
        settings: &ProductivitySettings,
    ) -> TimerResult<ProductivityReport> {
        let since = range.window_start(&now);
        let timers = self
            .database()
            .list_timers_for_user_since(user_id, since)
            .await?;
        let report = summarize(&timers, range, settings);

        info!(
            "Productivity for {user_id} ({}): {} across {} timers",
            range.as_str(),
            report.readable_time,
            report.tasks_count
        );
        Ok(report)
    }

    pub async fn idle_report(&self, user_id: &str) -> TimerResult<IdleReport> {
        let intervals = self
            .database()
            .list_closed_intervals_for_user(user_id)
            .await?;
        Ok(summarize_idle(user_id, &intervals, &Local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerState;
    use chrono::Utc;

    fn timer(duration: u64) -> TimerRecord {
        TimerRecord {
            id: format!("timer-{duration}"),
            task_id: "task".into(),
            user_id: "user".into(),
            state: TimerState::Stopped,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            duration,
        }
    }

    #[test]
    fn daily_report_from_two_timers() {
        let report = summarize(
            &[timer(3600), timer(1800)],
            ProductivityRange::Daily,
            &ProductivitySettings::default(),
        );
        assert_eq!(report.total_minutes, 90);
        assert_eq!(report.total_hours, "1.50");
        assert_eq!(report.readable_time, "1h 30m");
        assert_eq!(report.tasks_count, 2);
        assert_eq!(report.productivity_percent, "18.75");
    }

    #[test]
    fn weekly_and_monthly_baselines() {
        let settings = ProductivitySettings::default();
        assert_eq!(settings.expected_seconds(ProductivityRange::Daily), 28_800);
        assert_eq!(settings.expected_seconds(ProductivityRange::Weekly), 144_000);
        assert_eq!(settings.expected_seconds(ProductivityRange::Monthly), 576_000);

        let report = summarize(&[timer(14_400)], ProductivityRange::Weekly, &settings);
        assert_eq!(report.productivity_percent, "10.00");
    }

    #[test]
    fn flat_offset_applies_only_above_threshold() {
        let settings = ProductivitySettings {
            adjustment: ProductivityAdjustment::FlatOffset { minutes: 80 },
            ..ProductivitySettings::default()
        };

        let over = summarize(&[timer(5400)], ProductivityRange::Daily, &settings);
        assert_eq!(over.total_minutes, 10);
        assert_eq!(over.readable_time, "0h 10m");
        assert_eq!(over.productivity_percent, "2.08");

        let under = summarize(&[timer(4800)], ProductivityRange::Daily, &settings);
        assert_eq!(under.total_minutes, 80);
    }

    #[test]
    fn percent_halves_round_up() {
        let settings = ProductivitySettings::default();
        let daily = summarize(&[timer(36)], ProductivityRange::Daily, &settings);
        assert_eq!(daily.productivity_percent, "0.13");

        let weekly = summarize(&[timer(180)], ProductivityRange::Weekly, &settings);
        assert_eq!(weekly.productivity_percent, "0.13");

        assert_eq!(two_decimals(1, 8), "0.13");
        assert_eq!(two_decimals(1, 3), "0.33");
        assert_eq!(two_decimals(2, 3), "0.67");
        assert_eq!(two_decimals(45, 60), "0.75");
    }

    #[test]
    fn empty_window() {
        let report = summarize(&[], ProductivityRange::Monthly, &ProductivitySettings::default());
        assert_eq!(report.total_minutes, 0);
        assert_eq!(report.total_hours, "0.00");
        assert_eq!(report.readable_time, "0h 0m");
        assert_eq!(report.tasks_count, 0);
        assert_eq!(report.productivity_percent, "0.00");
    }
}
