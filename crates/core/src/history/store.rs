use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(String),
}

/// How a live session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Stopped cleanly: manual stop, duration expiry, or the source ran out.
    Completed,
    /// The encoder failed or the process was orphaned.
    Error,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(SessionOutcome::Completed),
            "error" => Some(SessionOutcome::Error),
            _ => None,
        }
    }
}

/// One finished live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub job_id: String,
    pub owner_id: String,
    /// Job title at the time the session ended.
    pub title: String,
    pub platform: String,
    pub outcome: SessionOutcome,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
}

/// Record to insert; id and duration are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSessionRecord {
    pub job_id: String,
    pub owner_id: String,
    pub title: String,
    pub platform: String,
    pub outcome: SessionOutcome,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Filter for history queries; builder style.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub owner_id: Option<String>,
    pub job_id: Option<String>,
    pub outcome: Option<SessionOutcome>,
    pub limit: Option<u32>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_outcome(mut self, outcome: SessionOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregate numbers over an owner's sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_sessions: i64,
    pub completed: i64,
    pub errored: i64,
    pub total_duration_secs: i64,
}

/// Persistent store for session history.
pub trait HistoryStore: Send + Sync {
    fn insert(&self, record: NewSessionRecord) -> Result<SessionRecord, HistoryError>;

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<SessionRecord>, HistoryError>;

    fn stats(&self, owner_id: &str) -> Result<HistoryStats, HistoryError>;
}
