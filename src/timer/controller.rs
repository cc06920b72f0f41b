use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    db::{
        repositories::{
            intervals::{
                close_interval, find_latest_interval, find_open_interval, insert_interval,
            },
            tasks::{find_task, set_task_status},
            timers::{
                find_active_timer_for_task, find_timer, insert_timer, update_timer_progress,
            },
        },
        Database, IntervalRecord, ResumeOutcome, TaskRecord, TaskStatus, TimerRecord,
    },
    error::{TimerError, TimerResult},
    settings::Settings,
};

use super::{
    state::{elapsed_secs, format_hms, live_elapsed, running_since},
    AccountingMode, TimerAction, TimerState,
};

/// Point-in-time view of a timer's elapsed seconds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ElapsedSnapshot {
    pub timer_id: String,
    pub state: TimerState,
    pub seconds: u64,
    pub formatted: String,
    pub stopped: bool,
}

/// Drives timer transitions. Every transition is one transaction on the
/// database thread, so the interval write, the timer write and the task
/// status update land together.
#[derive(Clone)]
pub struct TimerController {
    db: Database,
    clock: Arc<dyn Clock>,
    accounting: AccountingMode,
    stream_interval: Duration,
}

fn ensure_transition(timer: &TimerRecord, action: TimerAction) -> TimerResult<TimerState> {
    timer
        .state
        .after(action)
        .ok_or_else(|| TimerError::InvalidState {
            timer_id: timer.id.clone(),
            state: timer.state.as_str(),
            action: action.as_str(),
        })
}

fn load_timer(conn: &rusqlite::Connection, timer_id: &str) -> TimerResult<TimerRecord> {
    find_timer(conn, timer_id)?.ok_or_else(|| TimerError::not_found("timer", timer_id))
}

impl TimerController {
    pub fn new(db: Database, settings: &Settings) -> Self {
        Self::with_clock(
            db,
            Arc::new(SystemClock),
            settings.accounting,
            settings.stream_interval(),
        )
    }

    pub fn with_clock(
        db: Database,
        clock: Arc<dyn Clock>,
        accounting: AccountingMode,
        stream_interval: Duration,
    ) -> Self {
        Self {
            db,
            clock,
            accounting,
            stream_interval,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn accounting(&self) -> AccountingMode {
        self.accounting
    }

    pub fn stream_interval(&self) -> Duration {
        self.stream_interval
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_task(&self, user_id: &str, name: &str) -> TimerResult<TaskRecord> {
        let now = self.clock.now();
        let task = TaskRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            status: TaskStatus::NotStarted,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_task(&task).await?;
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> TimerResult<TaskRecord> {
        self.db
            .get_task(task_id)
            .await?
            .ok_or_else(|| TimerError::not_found("task", task_id))
    }

    /// Remove a task together with its timers and intervals.
    pub async fn delete_task(&self, task_id: &str) -> TimerResult<()> {
        if !self.db.delete_task(task_id).await? {
            return Err(TimerError::not_found("task", task_id));
        }
        info!("Deleted task {task_id} and its timers");
        Ok(())
    }

    pub async fn start_timer(&self, task_id: &str, user_id: &str) -> TimerResult<TimerRecord> {
        let now = self.clock.now();
        let task_id = task_id.to_string();
        let user_id = user_id.to_string();

        let timer = self
            .db
            .transact(move |tx| {
                if find_task(tx, &task_id)?.is_none() {
                    return Err(TimerError::not_found("task", task_id));
                }
                if let Some(existing) = find_active_timer_for_task(tx, &task_id)? {
                    return Err(TimerError::Conflict {
                        existing: Box::new(existing),
                    });
                }

                let timer = TimerRecord {
                    id: Uuid::new_v4().to_string(),
                    task_id,
                    user_id,
                    state: TimerState::Running,
                    start_time: now,
                    end_time: None,
                    duration: 0,
                };
                insert_timer(tx, &timer)?;
                set_task_status(tx, &timer.task_id, TaskStatus::InProgress, now)?;
                Ok(timer)
            })
            .await?;

        info!("Started timer {} for task {}", timer.id, timer.task_id);
        Ok(timer)
    }

    pub async fn pause_timer(&self, timer_id: &str) -> TimerResult<IntervalRecord> {
        let now = self.clock.now();
        let accounting = self.accounting;
        let timer_id = timer_id.to_string();

        let interval = self
            .db
            .transact(move |tx| {
                let timer = load_timer(tx, &timer_id)?;
                let next = ensure_transition(&timer, TimerAction::Pause)?;
                if find_open_interval(tx, &timer.id)?.is_some() {
                    return Err(TimerError::InvalidState {
                        timer_id: timer.id,
                        state: TimerState::Paused.as_str(),
                        action: TimerAction::Pause.as_str(),
                    });
                }

                let duration = match accounting {
                    AccountingMode::PauseSpans => timer.duration,
                    AccountingMode::ActiveTime => {
                        let latest = find_latest_interval(tx, &timer.id)?;
                        let since = running_since(&timer, latest.as_ref());
                        timer.duration.saturating_add(elapsed_secs(since, now))
                    }
                };

                let interval = IntervalRecord {
                    id: Uuid::new_v4().to_string(),
                    timer_id: timer.id.clone(),
                    pause_time: now,
                    resume_time: None,
                    duration: None,
                };
                insert_interval(tx, &interval)?;
                update_timer_progress(tx, &timer.id, next, duration, None)?;
                set_task_status(tx, &timer.task_id, TaskStatus::Paused, now)?;
                Ok(interval)
            })
            .await?;

        info!("Paused timer {}", interval.timer_id);
        Ok(interval)
    }

    pub async fn resume_timer(&self, timer_id: &str) -> TimerResult<ResumeOutcome> {
        let now = self.clock.now();
        let accounting = self.accounting;
        let id = timer_id.to_string();

        let outcome = self
            .db
            .transact(move |tx| {
                let timer = load_timer(tx, &id)?;
                let open = find_open_interval(tx, &timer.id)?
                    .ok_or_else(|| TimerError::not_found("open interval for timer", &timer.id))?;
                let next = ensure_transition(&timer, TimerAction::Resume)?;

                let paused_secs = elapsed_secs(open.pause_time, now);
                close_interval(tx, &open.id, now, paused_secs)?;

                let added_duration = match accounting {
                    AccountingMode::PauseSpans => paused_secs,
                    AccountingMode::ActiveTime => 0,
                };
                let total_duration = timer.duration.saturating_add(added_duration);
                update_timer_progress(tx, &timer.id, next, total_duration, None)?;
                set_task_status(tx, &timer.task_id, TaskStatus::InProgress, now)?;

                Ok(ResumeOutcome {
                    resume_time: now,
                    added_duration,
                    total_duration,
                })
            })
            .await?;

        info!(
            "Resumed timer {timer_id}: +{}s, total {}s",
            outcome.added_duration, outcome.total_duration
        );
        Ok(outcome)
    }

    /// Stop a running or paused timer.
    ///
    /// A timer stopped while paused first has its open interval closed at
    /// `now`, exactly as a resume would. The trailing running period is then
    /// zero.
    pub async fn stop_timer(&self, timer_id: &str) -> TimerResult<TimerRecord> {
        let now = self.clock.now();
        let accounting = self.accounting;
        let timer_id = timer_id.to_string();

        let timer = self
            .db
            .transact(move |tx| {
                let timer = load_timer(tx, &timer_id)?;
                let next = ensure_transition(&timer, TimerAction::Stop)?;

                let mut duration = timer.duration;
                match find_open_interval(tx, &timer.id)? {
                    Some(open) => {
                        let paused_secs = elapsed_secs(open.pause_time, now);
                        close_interval(tx, &open.id, now, paused_secs)?;
                        if accounting == AccountingMode::PauseSpans {
                            duration = duration.saturating_add(paused_secs);
                        }
                    }
                    None => {
                        let latest = find_latest_interval(tx, &timer.id)?;
                        let since = running_since(&timer, latest.as_ref());
                        duration = duration.saturating_add(elapsed_secs(since, now));
                    }
                }

                update_timer_progress(tx, &timer.id, next, duration, Some(now))?;
                set_task_status(tx, &timer.task_id, TaskStatus::Completed, now)?;

                Ok(TimerRecord {
                    state: next,
                    end_time: Some(now),
                    duration,
                    ..timer
                })
            })
            .await?;

        info!(
            "Stopped timer {} after {}",
            timer.id,
            format_hms(timer.duration)
        );
        Ok(timer)
    }

    pub async fn get_timer(&self, timer_id: &str) -> TimerResult<TimerRecord> {
        self.db
            .get_timer(timer_id)
            .await?
            .ok_or_else(|| TimerError::not_found("timer", timer_id))
    }

    pub async fn list_timers_for_task(&self, task_id: &str) -> TimerResult<Vec<TimerRecord>> {
        Ok(self.db.list_timers_for_task(task_id).await?)
    }

    pub async fn list_intervals(&self, timer_id: &str) -> TimerResult<Vec<IntervalRecord>> {
        Ok(self.db.list_intervals(timer_id).await?)
    }

    /// Elapsed seconds right now: frozen while paused or stopped, otherwise
    /// the accumulated duration plus the current running period.
    pub async fn elapsed(&self, timer_id: &str) -> TimerResult<ElapsedSnapshot> {
        let lookup_id = timer_id.to_string();
        let (timer, latest) = self
            .db
            .execute(move |conn| {
                let timer = find_timer(conn, &lookup_id)?;
                let latest = match &timer {
                    Some(timer) => find_latest_interval(conn, &timer.id)?,
                    None => None,
                };
                Ok((timer, latest))
            })
            .await?;

        let timer = timer.ok_or_else(|| TimerError::not_found("timer", timer_id))?;
        let now = self.clock.now();
        let seconds = live_elapsed(&timer, latest.as_ref(), now);

        Ok(ElapsedSnapshot {
            timer_id: timer.id.clone(),
            state: timer.state,
            seconds,
            formatted: format_hms(seconds),
            stopped: timer.is_stopped(),
        })
    }
}
