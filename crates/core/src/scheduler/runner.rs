use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{Clock, SchedulerConfig};
use crate::metrics;
use crate::orchestrator::JobOrchestrator;

/// Periodic driver for time-based job transitions.
///
/// One background task wakes every tick interval and runs
/// [`JobOrchestrator::tick`]. Ticks never overlap: if a tick is still
/// running when the next fires, the new one is skipped rather than queued.
pub struct SchedulerLoop {
    config: SchedulerConfig,
    orchestrator: Arc<JobOrchestrator>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    ticking: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SchedulerLoop {
    pub fn new(
        config: SchedulerConfig,
        orchestrator: Arc<JobOrchestrator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            orchestrator,
            clock,
            running: Arc::new(AtomicBool::new(false)),
            ticking: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the loop (spawns the background task).
    pub fn start(&self) {
        if !self.config.enabled {
            info!("Scheduler disabled by configuration");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let ticking = Arc::clone(&self.ticking);
        let orchestrator = Arc::clone(&self.orchestrator);
        let clock = Arc::clone(&self.clock);
        let interval = Duration::from_secs(self.config.tick_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Scheduler loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }

                        // Skip rather than queue when the previous tick is
                        // still in flight.
                        if ticking.swap(true, Ordering::SeqCst) {
                            metrics::SCHEDULER_TICKS.with_label_values(&["skipped"]).inc();
                            warn!("Previous tick still running, skipping");
                            continue;
                        }

                        let now = clock.now();
                        match orchestrator.tick(now).await {
                            Ok(report) => {
                                metrics::SCHEDULER_TICKS.with_label_values(&["ok"]).inc();
                                if report.started + report.stopped + report.failed > 0 {
                                    info!(
                                        started = report.started,
                                        stopped = report.stopped,
                                        failed = report.failed,
                                        "Scheduler tick"
                                    );
                                }
                            }
                            Err(e) => {
                                metrics::SCHEDULER_TICKS.with_label_values(&["error"]).inc();
                                warn!("Scheduler tick failed: {}", e);
                            }
                        }

                        ticking.store(false, Ordering::SeqCst);
                    }
                }
            }
            info!("Scheduler loop stopped");
        });
    }

    /// Stop the loop gracefully.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }
}
