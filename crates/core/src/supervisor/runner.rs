//! Encoder process supervision.
//!
//! One watcher task per live job owns the encoder process exclusively. All
//! status movement goes through the job store's CAS transition, so a manual
//! stop, a duration-expiry stop and an unexpected process exit racing on the
//! same job resolve to exactly one winner without extra locking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use super::encoder::{EncodePlan, EncoderExit, EncoderLauncher, EncoderProcess};
use super::SupervisorConfig;
use crate::history::{HistoryStore, NewSessionRecord, SessionOutcome};
use crate::job::{Job, JobStatus, JobStore, JobStoreError, TransitionUpdate};
use crate::media::{MediaError, MediaResolver};
use crate::metrics;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} cannot start from status {status}")]
    Conflict { id: String, status: JobStatus },

    #[error("source unresolved: {0}")]
    SourceUnresolved(#[from] MediaError),

    #[error("failed to spawn encoder: {0}")]
    Spawn(String),

    #[error(transparent)]
    Store(JobStoreError),
}

impl From<JobStoreError> for SupervisorError {
    fn from(e: JobStoreError) -> Self {
        match e {
            JobStoreError::NotFound(id) => SupervisorError::NotFound(id),
            JobStoreError::Conflict { id, actual, .. } => SupervisorError::Conflict {
                id,
                status: actual,
            },
            other => SupervisorError::Store(other),
        }
    }
}

struct StopCommand {
    /// Resolved once the job row reaches a terminal status.
    ack: oneshot::Sender<()>,
}

/// Snapshot of job fields the watcher needs for the history record, taken
/// when the job goes live so later edits cannot skew it.
#[derive(Clone)]
struct SessionInfo {
    job_id: String,
    owner_id: String,
    title: String,
    platform: String,
    started_at: DateTime<Utc>,
}

/// Supervises encoder processes for live jobs.
pub struct ProcessSupervisor {
    store: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    resolver: Arc<dyn MediaResolver>,
    launcher: Arc<dyn EncoderLauncher>,
    config: SupervisorConfig,
    watchers: Mutex<HashMap<String, mpsc::Sender<StopCommand>>>,
}

impl ProcessSupervisor {
    pub fn new(
        store: Arc<dyn JobStore>,
        history: Arc<dyn HistoryStore>,
        resolver: Arc<dyn MediaResolver>,
        launcher: Arc<dyn EncoderLauncher>,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            history,
            resolver,
            launcher,
            config,
            watchers: Mutex::new(HashMap::new()),
        })
    }

    /// Start the encoder for a job.
    ///
    /// The live status is claimed through CAS before the process is spawned,
    /// so concurrent starts produce exactly one process; the losers see
    /// [`SupervisorError::Conflict`].
    pub async fn start(self: &Arc<Self>, job_id: &str) -> Result<Job, SupervisorError> {
        let job = self
            .store
            .get(job_id)?
            .ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;

        if !job.status.is_startable() {
            return Err(SupervisorError::Conflict {
                id: job_id.to_string(),
                status: job.status,
            });
        }

        let resolved = match self.resolver.resolve(job_id, &job.source).await {
            Ok(resolved) => resolved,
            Err(e) => {
                metrics::START_FAILURES.with_label_values(&["source"]).inc();
                // Best effort; a concurrent winner keeps its own state.
                let _ = self.store.transition(
                    job_id,
                    job.status,
                    TransitionUpdate::to_error(format!("source unresolved: {}", e), None),
                );
                return Err(SupervisorError::SourceUnresolved(e));
            }
        };

        let started_at = Utc::now();

        // Claim the live status first; the pid is recorded right after the
        // spawn. Whoever loses this CAS never spawns a process. Until the pid
        // write lands the row reads as live with no pid; a crash inside that
        // window leaves a row the startup reconciliation pass moves to error.
        let claimed = self.store.transition(
            job_id,
            job.status,
            TransitionUpdate {
                status: JobStatus::Live,
                process_pid: None,
                started_at: Some(started_at),
                ended_at: None,
                last_error: crate::job::ErrorUpdate::Clear,
            },
        )?;

        let plan = EncodePlan::from_job(&claimed, resolved);
        let process = match self.launcher.launch(&plan).await {
            Ok(process) => process,
            Err(e) => {
                metrics::START_FAILURES.with_label_values(&["spawn"]).inc();
                let message = format!("encoder spawn failed: {}", e);
                tracing::error!(job_id = %job_id, "{}", message);
                self.store.transition(
                    job_id,
                    JobStatus::Live,
                    TransitionUpdate::to_error(&message, Some(Utc::now())),
                )?;
                return Err(SupervisorError::Spawn(e.to_string()));
            }
        };

        let pid = process.pid();
        let job = match self.store.transition(
            job_id,
            JobStatus::Live,
            TransitionUpdate {
                status: JobStatus::Live,
                process_pid: Some(pid),
                started_at: None,
                ended_at: None,
                last_error: crate::job::ErrorUpdate::Keep,
            },
        ) {
            Ok(job) => job,
            Err(e) => {
                // The job was moved out of live under us; the process must
                // not outlive the claim.
                tracing::warn!(job_id = %job_id, "job left live during spawn: {}", e);
                let mut process = process;
                let _ = process.kill().await;
                let _ = process.wait().await;
                return Err(e.into());
            }
        };

        let info = SessionInfo {
            job_id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            title: job.title.clone(),
            platform: job.platform.clone(),
            started_at,
        };

        let (stop_tx, stop_rx) = mpsc::channel(1);
        self.watchers
            .lock()
            .unwrap()
            .insert(job_id.to_string(), stop_tx);

        metrics::LIVE_JOBS.inc();
        tracing::info!(job_id = %job_id, pid = pid, "job live");

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor.watch(process, info, stop_rx).await;
        });

        Ok(job)
    }

    /// Stop a job. Idempotent: any non-live, non-stopping status is a
    /// successful no-op. Waits until the job row is terminal.
    pub async fn stop(&self, job_id: &str) -> Result<(), SupervisorError> {
        let job = self
            .store
            .get(job_id)?
            .ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;

        match job.status {
            JobStatus::Live => {}
            // Another stop is already in flight.
            JobStatus::Stopping => return Ok(()),
            _ => return Ok(()),
        }

        match self.store.transition(
            job_id,
            JobStatus::Live,
            TransitionUpdate::to_stopping(job.process_pid),
        ) {
            Ok(_) => {}
            // Lost the race to the watcher or another stop; still a stop.
            Err(JobStoreError::Conflict { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let sender = {
            let watchers = self.watchers.lock().unwrap();
            watchers.get(job_id).cloned()
        };

        match sender {
            Some(tx) => {
                let (ack, ack_rx) = oneshot::channel();
                if tx.send(StopCommand { ack }).await.is_ok() {
                    // Watcher finalizes the row; an error means it already
                    // exited, which also means the row is terminal.
                    let _ = ack_rx.await;
                } else {
                    self.finalize_unwatched(job_id);
                }
            }
            // No watcher in this instance; nothing to signal.
            None => self.finalize_unwatched(job_id),
        }

        Ok(())
    }

    /// A stopping row without a watcher has no process behind it in this
    /// instance; close it out directly. The session is recorded with an error
    /// outcome since a clean encoder exit was never observed.
    fn finalize_unwatched(&self, job_id: &str) {
        tracing::warn!(job_id = %job_id, "stopping job has no supervised process");
        let ended_at = Utc::now();
        match self.store.transition(
            job_id,
            JobStatus::Stopping,
            TransitionUpdate::to_offline(ended_at),
        ) {
            Ok(job) => {
                self.record_session(
                    &SessionInfo {
                        job_id: job.id.clone(),
                        owner_id: job.owner_id.clone(),
                        title: job.title.clone(),
                        platform: job.platform.clone(),
                        started_at: job.started_at.unwrap_or(ended_at),
                    },
                    SessionOutcome::Error,
                    Some("no supervised process".to_string()),
                    ended_at,
                );
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, "failed to finalize unwatched job: {}", e);
            }
        }
    }

    /// One-time startup pass: every live or stopping row belongs to a
    /// previous instance of this process and its encoder is gone. Move each
    /// to error and record the aborted session.
    pub fn reconcile(&self) -> Result<usize, SupervisorError> {
        let orphans = self.store.list_active().map_err(SupervisorError::Store)?;
        let count = orphans.len();

        for job in orphans {
            let ended_at = Utc::now();
            match self.store.transition(
                &job.id,
                job.status,
                TransitionUpdate::to_error("orphaned process", Some(ended_at)),
            ) {
                Ok(_) => {
                    tracing::warn!(job_id = %job.id, "reconciled orphaned job");
                    self.record_session(
                        &SessionInfo {
                            job_id: job.id.clone(),
                            owner_id: job.owner_id.clone(),
                            title: job.title.clone(),
                            platform: job.platform.clone(),
                            started_at: job.started_at.unwrap_or(ended_at),
                        },
                        SessionOutcome::Error,
                        Some("orphaned process".to_string()),
                        ended_at,
                    );
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, "failed to reconcile job: {}", e);
                }
            }
        }

        Ok(count)
    }

    /// True while a watcher task exists for the job in this instance.
    pub fn is_watched(&self, job_id: &str) -> bool {
        self.watchers.lock().unwrap().contains_key(job_id)
    }

    async fn watch(
        self: Arc<Self>,
        mut process: Box<dyn EncoderProcess>,
        info: SessionInfo,
        mut stop_rx: mpsc::Receiver<StopCommand>,
    ) {
        let job_id = info.job_id.clone();

        let result = tokio::select! {
            exit = process.wait() => WatchEvent::Exited(exit),
            cmd = stop_rx.recv() => match cmd {
                Some(cmd) => WatchEvent::StopRequested(cmd),
                // All senders dropped without a command; keep waiting.
                None => WatchEvent::Exited(process.wait().await),
            },
        };

        match result {
            WatchEvent::StopRequested(cmd) => {
                self.shutdown_process(&job_id, process.as_mut()).await;
                self.finish(&info, SessionOutcome::Completed, None).await;
                let _ = cmd.ack.send(());
            }
            WatchEvent::Exited(exit) => {
                let (outcome, error) = match exit {
                    Ok(EncoderExit::Clean) => (SessionOutcome::Completed, None),
                    Ok(EncoderExit::Failed { message }) => {
                        (SessionOutcome::Error, Some(message))
                    }
                    Err(e) => (
                        SessionOutcome::Error,
                        Some(format!("failed to observe encoder exit: {}", e)),
                    ),
                };
                self.finish(&info, outcome, error).await;
            }
        }

        self.watchers.lock().unwrap().remove(&job_id);
        metrics::LIVE_JOBS.dec();
    }

    /// Graceful quit, bounded by the grace period, then a hard kill. The
    /// stop succeeds either way.
    async fn shutdown_process(&self, job_id: &str, process: &mut dyn EncoderProcess) {
        if let Err(e) = process.signal_quit().await {
            tracing::debug!(job_id = %job_id, "quit signal failed: {}", e);
        }

        let grace = Duration::from_secs(self.config.grace_period_secs);
        match timeout(grace, process.wait()).await {
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(job_id = %job_id, "grace period elapsed, killing encoder");
                let _ = process.kill().await;
                let _ = process.wait().await;
            }
        }
    }

    /// Move the job row to its terminal status and record the session. The
    /// row may be live (natural exit) or stopping (stop request, or a stop
    /// that raced the exit); CAS resolves which.
    async fn finish(&self, info: &SessionInfo, outcome: SessionOutcome, error: Option<String>) {
        let job_id = &info.job_id;
        let ended_at = Utc::now();

        let (update, from_stopping_update) = match (&outcome, &error) {
            (SessionOutcome::Error, Some(message)) => (
                TransitionUpdate::to_error(message.clone(), Some(ended_at)),
                // A stop was requested before the failure surfaced; the
                // caller asked for a stop and got one.
                TransitionUpdate::to_offline(ended_at),
            ),
            _ => (
                TransitionUpdate::to_offline(ended_at),
                TransitionUpdate::to_offline(ended_at),
            ),
        };

        let mut recorded_outcome = outcome;
        let mut recorded_error = error;

        match self.store.transition(job_id, JobStatus::Live, update) {
            Ok(_) => {
                if recorded_outcome == SessionOutcome::Error {
                    metrics::JOB_CRASHES.inc();
                    tracing::error!(
                        job_id = %job_id,
                        "encoder exited unexpectedly: {}",
                        recorded_error.as_deref().unwrap_or("unknown")
                    );
                } else {
                    tracing::info!(job_id = %job_id, "job offline");
                }
            }
            Err(JobStoreError::Conflict {
                actual: JobStatus::Stopping,
                ..
            }) => {
                if let Err(e) =
                    self.store
                        .transition(job_id, JobStatus::Stopping, from_stopping_update)
                {
                    tracing::warn!(job_id = %job_id, "failed to finalize stop: {}", e);
                }
                recorded_outcome = SessionOutcome::Completed;
                recorded_error = None;
                tracing::info!(job_id = %job_id, "job offline");
            }
            Err(e) => {
                // Already terminal; someone else finalized the row.
                tracing::debug!(job_id = %job_id, "terminal transition skipped: {}", e);
            }
        }

        self.record_session(info, recorded_outcome, recorded_error, ended_at);
    }

    /// Fire-and-forget history emission; a history failure never rolls back
    /// the job transition.
    fn record_session(
        &self,
        info: &SessionInfo,
        outcome: SessionOutcome,
        error: Option<String>,
        ended_at: DateTime<Utc>,
    ) {
        let duration_secs = (ended_at - info.started_at).num_seconds().max(0);
        metrics::SESSION_DURATION
            .with_label_values(&[outcome.as_str()])
            .observe(duration_secs as f64);

        let record = NewSessionRecord {
            job_id: info.job_id.clone(),
            owner_id: info.owner_id.clone(),
            title: info.title.clone(),
            platform: info.platform.clone(),
            outcome,
            error,
            started_at: info.started_at,
            ended_at,
        };

        if let Err(e) = self.history.insert(record) {
            tracing::warn!(job_id = %info.job_id, "failed to record session history: {}", e);
        }
    }
}

enum WatchEvent {
    Exited(Result<EncoderExit, super::encoder::EncoderError>),
    StopRequested(StopCommand),
}
