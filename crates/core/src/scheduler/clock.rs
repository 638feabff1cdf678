use chrono::{DateTime, Utc};

/// Time source for the scheduler, injectable so time-based transitions are
/// testable without wall-clock waits.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
