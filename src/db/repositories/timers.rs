use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_datetime, parse_optional_datetime, parse_timer_state, to_i64,
        to_u64,
    },
    models::TimerRecord,
};
use crate::timer::TimerState;

const TIMER_COLUMNS: &str = "id, task_id, user_id, state, start_time, end_time, duration_secs";

fn row_to_timer(row: &Row) -> Result<TimerRecord> {
    let state: String = row.get("state")?;
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let duration: i64 = row.get("duration_secs")?;

    Ok(TimerRecord {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        state: parse_timer_state(&state)?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        duration: to_u64(duration, "duration_secs")?,
    })
}

fn collect_timers(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<TimerRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(args)?;
    let mut timers = Vec::new();
    while let Some(row) = rows.next()? {
        timers.push(row_to_timer(row)?);
    }
    Ok(timers)
}

pub(crate) fn find_timer(conn: &Connection, timer_id: &str) -> Result<Option<TimerRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TIMER_COLUMNS} FROM timers WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![timer_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_timer(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn find_active_timer_for_task(
    conn: &Connection,
    task_id: &str,
) -> Result<Option<TimerRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TIMER_COLUMNS} FROM timers
         WHERE task_id = ?1 AND state != 'Stopped'
         ORDER BY start_time DESC
         LIMIT 1"
    ))?;
    let mut rows = stmt.query(params![task_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_timer(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn insert_timer(conn: &Connection, timer: &TimerRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO timers (id, task_id, user_id, state, start_time, end_time, duration_secs)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            timer.id,
            timer.task_id,
            timer.user_id,
            timer.state.as_str(),
            format_datetime(&timer.start_time),
            timer.end_time.as_ref().map(format_datetime),
            to_i64(timer.duration)?,
        ],
    )
    .context("failed to insert timer")?;
    Ok(())
}

/// Persist the mutable part of a timer: state, accumulated duration and
/// end time. `start_time` is never rewritten.
pub(crate) fn update_timer_progress(
    conn: &Connection,
    timer_id: &str,
    state: TimerState,
    duration: u64,
    end_time: Option<DateTime<Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE timers
         SET state = ?1,
             duration_secs = ?2,
             end_time = ?3
         WHERE id = ?4",
        params![
            state.as_str(),
            to_i64(duration)?,
            end_time.as_ref().map(format_datetime),
            timer_id,
        ],
    )
    .context("failed to update timer progress")?;
    Ok(())
}

impl Database {
    pub async fn get_timer(&self, timer_id: &str) -> Result<Option<TimerRecord>> {
        let timer_id = timer_id.to_string();
        self.execute(move |conn| find_timer(conn, &timer_id)).await
    }

    pub async fn list_timers_for_task(&self, task_id: &str) -> Result<Vec<TimerRecord>> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            collect_timers(
                conn,
                &format!(
                    "SELECT {TIMER_COLUMNS} FROM timers
                     WHERE task_id = ?1
                     ORDER BY start_time ASC"
                ),
                params![task_id],
            )
        })
        .await
    }

    /// Timers of `user_id` whose start_time is at or after `since`.
    pub async fn list_timers_for_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TimerRecord>> {
        let user_id = user_id.to_string();
        let since = format_datetime(&since);
        self.execute(move |conn| {
            collect_timers(
                conn,
                &format!(
                    "SELECT {TIMER_COLUMNS} FROM timers
                     WHERE user_id = ?1 AND start_time >= ?2
                     ORDER BY start_time ASC"
                ),
                params![user_id, since],
            )
        })
        .await
    }
}
