use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime, to_i64, to_u64},
    models::IntervalRecord,
};

const INTERVAL_COLUMNS: &str = "id, timer_id, pause_time, resume_time, duration_secs";

fn row_to_interval(row: &Row) -> Result<IntervalRecord> {
    let pause_time: String = row.get("pause_time")?;
    let resume_time: Option<String> = row.get("resume_time")?;
    let duration: Option<i64> = row.get("duration_secs")?;

    Ok(IntervalRecord {
        id: row.get("id")?,
        timer_id: row.get("timer_id")?,
        pause_time: parse_datetime(&pause_time, "pause_time")?,
        resume_time: parse_optional_datetime(resume_time, "resume_time")?,
        duration: duration
            .map(|secs| to_u64(secs, "duration_secs"))
            .transpose()?,
    })
}

fn first_interval(
    conn: &Connection,
    sql: &str,
    timer_id: &str,
) -> Result<Option<IntervalRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![timer_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_interval(row)?)),
        None => Ok(None),
    }
}

/// Most recent interval of a timer, open or closed. Ties on pause_time fall
/// back to insertion order.
pub(crate) fn find_latest_interval(
    conn: &Connection,
    timer_id: &str,
) -> Result<Option<IntervalRecord>> {
    first_interval(
        conn,
        &format!(
            "SELECT {INTERVAL_COLUMNS} FROM intervals
             WHERE timer_id = ?1
             ORDER BY pause_time DESC, rowid DESC
             LIMIT 1"
        ),
        timer_id,
    )
}

pub(crate) fn find_open_interval(
    conn: &Connection,
    timer_id: &str,
) -> Result<Option<IntervalRecord>> {
    first_interval(
        conn,
        &format!(
            "SELECT {INTERVAL_COLUMNS} FROM intervals
             WHERE timer_id = ?1 AND resume_time IS NULL
             ORDER BY pause_time DESC, rowid DESC
             LIMIT 1"
        ),
        timer_id,
    )
}

pub(crate) fn insert_interval(conn: &Connection, interval: &IntervalRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO intervals (id, timer_id, pause_time, resume_time, duration_secs)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            interval.id,
            interval.timer_id,
            format_datetime(&interval.pause_time),
            interval.resume_time.as_ref().map(format_datetime),
            interval.duration.map(to_i64).transpose()?,
        ],
    )
    .context("failed to insert interval")?;
    Ok(())
}

/// Close an open interval. The `resume_time IS NULL` guard keeps a closed
/// interval from ever being rewritten.
pub(crate) fn close_interval(
    conn: &Connection,
    interval_id: &str,
    resume_time: DateTime<Utc>,
    duration: u64,
) -> Result<()> {
    let rows_affected = conn
        .execute(
            "UPDATE intervals
             SET resume_time = ?1,
                 duration_secs = ?2
             WHERE id = ?3 AND resume_time IS NULL",
            params![format_datetime(&resume_time), to_i64(duration)?, interval_id],
        )
        .context("failed to close interval")?;

    if rows_affected == 0 {
        anyhow::bail!("interval {interval_id} is not open");
    }
    Ok(())
}

impl Database {
    pub async fn list_intervals(&self, timer_id: &str) -> Result<Vec<IntervalRecord>> {
        let timer_id = timer_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INTERVAL_COLUMNS} FROM intervals
                 WHERE timer_id = ?1
                 ORDER BY pause_time ASC, rowid ASC"
            ))?;
            let mut rows = stmt.query(params![timer_id])?;
            let mut intervals = Vec::new();
            while let Some(row) = rows.next()? {
                intervals.push(row_to_interval(row)?);
            }
            Ok(intervals)
        })
        .await
    }

    pub async fn get_latest_interval(&self, timer_id: &str) -> Result<Option<IntervalRecord>> {
        let timer_id = timer_id.to_string();
        self.execute(move |conn| find_latest_interval(conn, &timer_id))
            .await
    }

    /// Every closed interval belonging to any timer of `user_id`.
    pub async fn list_closed_intervals_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<IntervalRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.timer_id, i.pause_time, i.resume_time, i.duration_secs
                 FROM intervals i
                 JOIN timers t ON t.id = i.timer_id
                 WHERE t.user_id = ?1 AND i.resume_time IS NOT NULL
                 ORDER BY i.pause_time ASC",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut intervals = Vec::new();
            while let Some(row) = rows.next()? {
                intervals.push(row_to_interval(row)?);
            }
            Ok(intervals)
        })
        .await
    }
}
