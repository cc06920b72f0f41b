use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_task_status},
    models::{TaskRecord, TaskStatus},
};

const TASK_COLUMNS: &str = "id, user_id, name, status, created_at, updated_at";

fn row_to_task(row: &Row) -> Result<TaskRecord> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(TaskRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        status: parse_task_status(&status)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

pub(crate) fn find_task(conn: &Connection, task_id: &str) -> Result<Option<TaskRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
    let mut rows = stmt.query(params![task_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_task(row)?)),
        None => Ok(None),
    }
}

/// Mirrors a timer transition onto the owning task. A missing task is not
/// an error here; the timer row's foreign key already guarantees it exists.
pub(crate) fn set_task_status(
    conn: &Connection,
    task_id: &str,
    status: TaskStatus,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), format_datetime(&updated_at), task_id],
    )
    .context("failed to update task status")?;
    Ok(())
}

impl Database {
    pub async fn insert_task(&self, task: &TaskRecord) -> Result<()> {
        let record = task.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, user_id, name, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.user_id,
                    record.name,
                    record.status.as_str(),
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                ],
            )
            .context("failed to insert task")?;
            Ok(())
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let task_id = task_id.to_string();
        self.execute(move |conn| find_task(conn, &task_id)).await
    }

    /// Delete a task. Its timers and their intervals go with it through
    /// ON DELETE CASCADE. Returns whether a row was removed.
    pub async fn delete_task(&self, task_id: &str) -> Result<bool> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![task_id])
                .context("failed to delete task")?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
