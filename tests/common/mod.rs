#![allow(dead_code)]

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tasktimer_lib::{
    db::TaskRecord, timer::AccountingMode, Database, ManualClock, TimerController,
};

pub const USER: &str = "user-1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub timers: TimerController,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(accounting: AccountingMode) -> Self {
        let db = Database::in_memory().unwrap();
        let clock = ManualClock::new(t0());
        let timers = TimerController::with_clock(
            db,
            Arc::new(clock.clone()),
            accounting,
            StdDuration::from_millis(10),
        );
        Self { timers, clock }
    }

    /// Move the clock to `secs` seconds after [`t0`].
    pub fn at(&self, secs: i64) {
        self.clock.set(t0() + Duration::seconds(secs));
    }

    pub async fn task(&self) -> TaskRecord {
        self.timers.create_task(USER, "write report").await.unwrap()
    }
}
