use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{IntervalRecord, TimerRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TimerState {
    /// No timer record exists for the task.
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl TimerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Idle => "Idle",
            TimerState::Running => "Running",
            TimerState::Paused => "Paused",
            TimerState::Stopped => "Stopped",
        }
    }

    /// State of a task given its current (non-stopped or last) timer.
    pub fn of(timer: Option<&TimerRecord>) -> Self {
        timer.map_or(TimerState::Idle, |timer| timer.state)
    }

    /// Target state of `action`, or `None` if the transition is illegal.
    pub fn after(self, action: TimerAction) -> Option<TimerState> {
        match (self, action) {
            (TimerState::Idle | TimerState::Stopped, TimerAction::Start) => {
                Some(TimerState::Running)
            }
            (TimerState::Running, TimerAction::Pause) => Some(TimerState::Paused),
            (TimerState::Paused, TimerAction::Resume) => Some(TimerState::Running),
            (TimerState::Running | TimerState::Paused, TimerAction::Stop) => {
                Some(TimerState::Stopped)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl TimerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Resume => "resume",
            TimerAction::Stop => "stop",
        }
    }
}

/// What a closed pause credits to the timer's accumulated duration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountingMode {
    /// Resume adds the closed interval's length; stop adds the trailing
    /// period since the latest resume (or start).
    #[default]
    PauseSpans,
    /// Pause adds the running period since the latest resume (or start);
    /// resume adds nothing. The total equals pure running time.
    ActiveTime,
}

impl std::str::FromStr for AccountingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pause_spans" => Ok(AccountingMode::PauseSpans),
            "active_time" => Ok(AccountingMode::ActiveTime),
            other => Err(format!("unknown accounting mode '{other}'")),
        }
    }
}

/// Whole seconds between two instants, floored; negative spans count as 0.
pub fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let millis = (to - from).num_milliseconds().max(0);
    (millis / 1000) as u64
}

/// Start of the current running period: the latest resume, or the timer
/// start when it was never resumed.
pub fn running_since(timer: &TimerRecord, latest: Option<&IntervalRecord>) -> DateTime<Utc> {
    latest
        .and_then(|interval| interval.resume_time)
        .unwrap_or(timer.start_time)
}

/// Elapsed seconds as a live reader would see them at `now`.
pub fn live_elapsed(
    timer: &TimerRecord,
    latest: Option<&IntervalRecord>,
    now: DateTime<Utc>,
) -> u64 {
    if timer.is_stopped() || latest.is_some_and(IntervalRecord::is_open) {
        return timer.duration;
    }
    timer
        .duration
        .saturating_add(elapsed_secs(running_since(timer, latest), now))
}

/// `"{h}h {m}m {s}s"`
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}h {minutes}m {seconds}s")
}
