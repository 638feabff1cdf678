//! Time-based job scheduling.

mod clock;
mod config;
mod runner;

pub use clock::{Clock, SystemClock};
pub use config::SchedulerConfig;
pub use runner::SchedulerLoop;
