pub mod controller;
pub mod state;
pub mod stream;

pub use controller::{ElapsedSnapshot, TimerController};
pub use state::{format_hms, AccountingMode, TimerAction, TimerState};
pub use stream::ElapsedStream;
