pub mod task;
pub mod timer;

pub use task::{TaskRecord, TaskStatus};
pub use timer::{IntervalRecord, ResumeOutcome, TimerRecord};
