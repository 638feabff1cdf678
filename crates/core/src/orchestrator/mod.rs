//! Orchestrator facade.
//!
//! The single entry point for job lifecycle actions. Manual callers and the
//! scheduler loop converge here, so every start and stop takes the same code
//! path through the supervisor and the store's CAS transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::job::{Job, JobStore, JobStoreError};
use crate::metrics;
use crate::supervisor::{ProcessSupervisor, SupervisorError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} is in status {status}")]
    Conflict {
        id: String,
        status: crate::job::JobStatus,
    },

    #[error("source unresolved: {0}")]
    SourceUnresolved(String),

    #[error("failed to spawn encoder: {0}")]
    Spawn(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<SupervisorError> for OrchestratorError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::NotFound(id) => OrchestratorError::NotFound(id),
            SupervisorError::Conflict { id, status } => OrchestratorError::Conflict { id, status },
            SupervisorError::SourceUnresolved(e) => {
                OrchestratorError::SourceUnresolved(e.to_string())
            }
            SupervisorError::Spawn(msg) => OrchestratorError::Spawn(msg),
            SupervisorError::Store(e) => OrchestratorError::Store(e.to_string()),
        }
    }
}

impl From<JobStoreError> for OrchestratorError {
    fn from(e: JobStoreError) -> Self {
        match e {
            JobStoreError::NotFound(id) => OrchestratorError::NotFound(id),
            JobStoreError::Conflict { id, actual, .. } => OrchestratorError::Conflict {
                id,
                status: actual,
            },
            JobStoreError::Active { id, status } => OrchestratorError::Conflict { id, status },
            other => OrchestratorError::Store(other.to_string()),
        }
    }
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub started: usize,
    pub stopped: usize,
    pub failed: usize,
}

pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    supervisor: Arc<ProcessSupervisor>,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, supervisor: Arc<ProcessSupervisor>) -> Arc<Self> {
        Arc::new(Self { store, supervisor })
    }

    /// Manual start.
    pub async fn start(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        let job = self.supervisor.start(job_id).await?;
        metrics::JOBS_STARTED.with_label_values(&["manual"]).inc();
        Ok(job)
    }

    /// Manual stop; idempotent.
    pub async fn stop(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.supervisor.stop(job_id).await?;
        metrics::JOBS_STOPPED.with_label_values(&["manual"]).inc();
        Ok(())
    }

    /// Current job snapshot.
    pub fn status(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        self.store
            .get(job_id)?
            .ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))
    }

    /// Delete a job, stopping it first when a process is attached.
    pub async fn delete(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        let job = self.status(job_id)?;

        if job.status.is_active() {
            self.supervisor.stop(job_id).await?;
            metrics::JOBS_STOPPED.with_label_values(&["delete"]).inc();
        }

        // The store refuses to delete a live or stopping row; if a concurrent
        // start re-claimed the job after the stop above, this surfaces as a
        // conflict instead of deleting a row with a running encoder.
        Ok(self.store.delete(job_id)?)
    }

    /// One scheduler pass: start due scheduled jobs, stop expired live ones.
    /// Failures are isolated per job; the pass always runs to completion.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, OrchestratorError> {
        let mut report = TickReport::default();

        let due = self.store.list_due_scheduled(now)?;
        for job in due {
            match self.supervisor.start(&job.id).await {
                Ok(_) => {
                    metrics::JOBS_STARTED.with_label_values(&["scheduled"]).inc();
                    report.started += 1;
                }
                Err(e) => {
                    // The start path already left the job in error; no retry.
                    tracing::error!(job_id = %job.id, "scheduled start failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        let expired = self.store.list_expired_live(now)?;
        for job in expired {
            match self.supervisor.stop(&job.id).await {
                Ok(()) => {
                    metrics::JOBS_STOPPED.with_label_values(&["expired"]).inc();
                    tracing::info!(job_id = %job.id, "duration budget elapsed, stopped");
                    report.stopped += 1;
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, "expiry stop failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
