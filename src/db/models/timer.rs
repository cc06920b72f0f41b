//! Timer and interval records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerState;

/// One measured timer attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerRecord {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub state: TimerState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Accumulated seconds credited so far.
    pub duration: u64,
}

impl TimerRecord {
    pub fn is_stopped(&self) -> bool {
        self.end_time.is_some() || self.state == TimerState::Stopped
    }
}

/// One pause→resume span within a timer. `resume_time == None` means the
/// timer is currently paused on this interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntervalRecord {
    pub id: String,
    pub timer_id: String,
    pub pause_time: DateTime<Utc>,
    pub resume_time: Option<DateTime<Utc>>,
    pub duration: Option<u64>,
}

impl IntervalRecord {
    pub fn is_open(&self) -> bool {
        self.resume_time.is_none()
    }
}

/// Reply to a successful resume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResumeOutcome {
    pub resume_time: DateTime<Utc>,
    pub added_duration: u64,
    pub total_duration: u64,
}
