pub mod intervals;
pub mod tasks;
pub mod timers;
