//! Server-assigned time
use crate::types::TimeStamp;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

/// Source of every timestamp the ledger writes. Callers never supply time.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// A clock that only moves when told to. Used to exercise time windows.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<TimeStamp<Utc>>,
}

impl ManualClock {
    pub fn starting_at(start: TimeStamp<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current = (current.to_datetime_utc() + by).into();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeStamp<Utc> {
        self.current.lock().clone()
    }
}
