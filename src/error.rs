//! Error taxonomy for timer operations.
//!
//! Storage code works in `anyhow::Result`; everything crossing the service
//! boundary is a [`TimerError`] so callers can map it to a status.

use thiserror::Error;

use crate::db::models::TimerRecord;

#[derive(Error, Debug)]
pub enum TimerError {
    /// A required identifier was missing or blank.
    #[error("{0} is required")]
    Validation(&'static str),

    /// A non-stopped timer already exists for the task.
    #[error("a timer already exists for task {}", existing.task_id)]
    Conflict { existing: Box<TimerRecord> },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The transition is illegal from the timer's current state.
    #[error("timer {timer_id} is {state}; cannot {action}")]
    InvalidState {
        timer_id: String,
        state: &'static str,
        action: &'static str,
    },

    #[error("invalid {name}: {value}")]
    InvalidArgument { name: &'static str, value: String },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl TimerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        TimerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// HTTP-style status code for the error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            TimerError::Validation(_) | TimerError::InvalidArgument { .. } => 400,
            TimerError::NotFound { .. } => 404,
            TimerError::Conflict { .. } | TimerError::InvalidState { .. } => 409,
            TimerError::Storage(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for TimerError {
    fn from(err: rusqlite::Error) -> Self {
        TimerError::Storage(anyhow::Error::new(err))
    }
}

pub type TimerResult<T> = std::result::Result<T, TimerError>;
