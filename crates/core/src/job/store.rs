use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{Destination, EncodeParams, Job, JobStatus, Schedule, SourceRef};

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} is in status {actual}, expected {expected}")]
    Conflict {
        id: String,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("job {id} cannot be modified while {status}")]
    Active { id: String, status: JobStatus },

    #[error("database error: {0}")]
    Database(String),
}

/// Fields supplied when creating a job. Identity, status and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub owner_id: String,
    pub title: String,
    pub platform: String,
    pub source: SourceRef,
    pub destination: Destination,
    pub encode: EncodeParams,
    pub schedule: Schedule,
}

/// Settings that may be edited while a job is not active. `None` leaves the
/// field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub platform: Option<String>,
    pub source: Option<SourceRef>,
    pub destination: Option<Destination>,
    pub encode: Option<EncodeParams>,
    pub schedule: Option<Schedule>,
}

/// Row updates applied atomically with a status transition.
///
/// `process_pid` is always written. `last_error` is tri-state: set a new
/// message, clear the existing one, or leave it untouched.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub status: JobStatus,
    pub process_pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: ErrorUpdate,
}

#[derive(Debug, Clone)]
pub enum ErrorUpdate {
    Set(String),
    Clear,
    Keep,
}

impl TransitionUpdate {
    /// Transition into live: record the pid and start instant, clear any
    /// failure left over from a previous run.
    pub fn to_live(pid: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Live,
            process_pid: Some(pid),
            started_at: Some(started_at),
            ended_at: None,
            last_error: ErrorUpdate::Clear,
        }
    }

    /// Transition into stopping; the pid stays attached until the process
    /// is confirmed gone.
    pub fn to_stopping(pid: Option<u32>) -> Self {
        Self {
            status: JobStatus::Stopping,
            process_pid: pid,
            started_at: None,
            ended_at: None,
            last_error: ErrorUpdate::Keep,
        }
    }

    /// Terminal transition after a clean stop.
    pub fn to_offline(ended_at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Offline,
            process_pid: None,
            started_at: None,
            ended_at: Some(ended_at),
            last_error: ErrorUpdate::Keep,
        }
    }

    /// Terminal transition after a failure.
    pub fn to_error(message: impl Into<String>, ended_at: Option<DateTime<Utc>>) -> Self {
        Self {
            status: JobStatus::Error,
            process_pid: None,
            started_at: None,
            ended_at,
            last_error: ErrorUpdate::Set(message.into()),
        }
    }
}

/// Filter for job listings; builder style.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub owner_id: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Persistent store for relay jobs.
///
/// All status changes go through [`transition`](JobStore::transition), a
/// compare-and-swap keyed on the expected current status. Concurrent actors
/// racing on the same job are serialized by the database: exactly one CAS
/// wins, the losers observe [`JobStoreError::Conflict`].
pub trait JobStore: Send + Sync {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobStoreError>;

    fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError>;

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError>;

    /// Scheduled jobs whose start instant is at or before `now`.
    fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError>;

    /// Live jobs with a duration budget that has elapsed as of `now`.
    fn list_expired_live(&self, now: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError>;

    /// Live and stopping jobs, regardless of duration. Used by the startup
    /// reconciliation pass.
    fn list_active(&self) -> Result<Vec<Job>, JobStoreError>;

    /// Atomically move the job from `expected` to `update.status`, applying
    /// the accompanying field updates. Fails with `Conflict` if the current
    /// status no longer matches `expected`.
    fn transition(
        &self,
        id: &str,
        expected: JobStatus,
        update: TransitionUpdate,
    ) -> Result<Job, JobStoreError>;

    /// Edit job settings. Rejected while the job is live or stopping.
    fn update_settings(&self, id: &str, request: UpdateJobRequest) -> Result<Job, JobStoreError>;

    fn delete(&self, id: &str) -> Result<Job, JobStoreError>;
}
