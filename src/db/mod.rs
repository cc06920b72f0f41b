mod connection;
mod helpers;
mod migrations;
pub mod models;
pub(crate) mod repositories;

pub use connection::Database;
pub use models::{IntervalRecord, ResumeOutcome, TaskRecord, TaskStatus, TimerRecord};
