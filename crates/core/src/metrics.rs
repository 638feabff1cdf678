//! Prometheus metrics for core components.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

/// Jobs started by trigger ("manual", "scheduled").
pub static JOBS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relaycast_jobs_started_total", "Total job starts"),
        &["trigger"],
    )
    .unwrap()
});

/// Jobs stopped by trigger ("manual", "expired", "delete").
pub static JOBS_STOPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relaycast_jobs_stopped_total", "Total job stops"),
        &["trigger"],
    )
    .unwrap()
});

/// Encoder processes that exited without a stop request.
pub static JOB_CRASHES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "relaycast_job_crashes_total",
        "Total unexpected encoder exits",
    )
    .unwrap()
});

/// Jobs failed before the encoder was running (resolve or spawn failure).
pub static START_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relaycast_start_failures_total", "Total failed job starts"),
        &["reason"], // "source", "spawn"
    )
    .unwrap()
});

/// Currently live encoder processes.
pub static LIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("relaycast_live_jobs", "Number of currently live jobs").unwrap()
});

/// Scheduler ticks by result ("ok", "skipped", "error").
pub static SCHEDULER_TICKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relaycast_scheduler_ticks_total", "Total scheduler ticks"),
        &["result"],
    )
    .unwrap()
});

/// Session durations in seconds.
pub static SESSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "relaycast_session_duration_seconds",
            "Duration of finished live sessions",
        )
        .buckets(vec![
            60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 43200.0,
        ]),
        &["outcome"], // "completed", "error"
    )
    .unwrap()
});

/// Upload slots denied by the concurrency guard.
pub static GUARD_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "relaycast_guard_rejections_total",
        "Total acquisitions denied by the concurrency guard",
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_STOPPED.clone()),
        Box::new(JOB_CRASHES.clone()),
        Box::new(START_FAILURES.clone()),
        Box::new(LIVE_JOBS.clone()),
        Box::new(SCHEDULER_TICKS.clone()),
        Box::new(SESSION_DURATION.clone()),
        Box::new(GUARD_REJECTIONS.clone()),
    ]
}
