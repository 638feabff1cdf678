//! Session history API handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use relaycast_core::history::{HistoryFilter, HistoryStats, SessionOutcome, SessionRecord};

use crate::state::AppState;

/// Maximum allowed limit for history queries
const MAX_LIMIT: u32 = 1000;

/// Default limit for history queries
const DEFAULT_LIMIT: u32 = 100;

/// Query parameters for listing sessions
#[derive(Debug, Deserialize)]
pub struct ListSessionsParams {
    /// Filter by owner
    pub owner_id: Option<String>,
    /// Filter by job
    pub job_id: Option<String>,
    /// Filter by outcome ("completed" or "error")
    pub outcome: Option<String>,
    /// Maximum number of records to return
    pub limit: Option<u32>,
}

/// Query parameters for history stats
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub owner_id: String,
}

/// One recorded live session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub job_id: String,
    pub owner_id: String,
    pub title: String,
    pub platform: String,
    pub outcome: String,
    pub error: Option<String>,
    pub started_at: String,
    pub ended_at: String,
    pub duration_secs: i64,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            job_id: record.job_id,
            owner_id: record.owner_id,
            title: record.title,
            platform: record.platform,
            outcome: record.outcome.as_str().to_string(),
            error: record.error,
            started_at: record.started_at.to_rfc3339(),
            ended_at: record.ended_at.to_rfc3339(),
            duration_secs: record.duration_secs,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryErrorResponse {
    pub error: String,
}

/// List recorded sessions, newest first
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSessionsParams>,
) -> Result<Json<ListSessionsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut filter = HistoryFilter::new().with_limit(limit);

    if let Some(owner_id) = params.owner_id {
        filter = filter.with_owner(owner_id);
    }

    if let Some(job_id) = params.job_id {
        filter = filter.with_job(job_id);
    }

    if let Some(ref outcome) = params.outcome {
        match SessionOutcome::parse(outcome) {
            Some(outcome) => filter = filter.with_outcome(outcome),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(HistoryErrorResponse {
                        error: format!("Unknown outcome: {}", outcome),
                    }),
                ));
            }
        }
    }

    match state.history_store().list(&filter) {
        Ok(records) => {
            let sessions: Vec<SessionResponse> =
                records.into_iter().map(SessionResponse::from).collect();
            Ok(Json(ListSessionsResponse {
                total: sessions.len(),
                sessions,
            }))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HistoryErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// Aggregate stats for one owner
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<HistoryStats>, impl IntoResponse> {
    match state.history_store().stats(&params.owner_id) {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HistoryErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
