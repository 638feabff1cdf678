//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use relaycast_core::{
    job::{
        CreateJobRequest, Destination, EncodeParams, Job, JobFilter, JobStatus, JobStoreError,
        Schedule, SourceRef, UpdateJobRequest,
    },
    platform, OrchestratorError,
};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: u32 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: u32 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    pub owner_id: String,
    pub title: String,
    pub source: SourceRef,
    pub destination: Destination,
    /// Encoder parameters; defaults applied per field when omitted
    #[serde(default)]
    pub encode: EncodeParams,
    /// Optional time bounds
    #[serde(default)]
    pub schedule: Schedule,
}

/// Request body for updating job settings. Omitted fields are unchanged.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateJobBody {
    pub title: Option<String>,
    pub source: Option<SourceRef>,
    pub destination: Option<Destination>,
    pub encode: Option<EncodeParams>,
    pub schedule: Option<Schedule>,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by owner
    pub owner_id: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<u32>,
    /// Number of jobs to skip for pagination
    pub offset: Option<u32>,
}

/// Response for job operations
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub platform: String,
    pub source: SourceRef,
    pub destination: Destination,
    pub encode: EncodeParams,
    pub schedule: Schedule,
    pub status: String,
    pub process_pid: Option<u32>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            owner_id: job.owner_id,
            title: job.title,
            platform: job.platform,
            source: job.source,
            destination: job.destination,
            encode: job.encode,
            schedule: job.schedule,
            status: job.status.as_str().to_string(),
            process_pid: job.process_pid,
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            ended_at: job.ended_at.map(|t| t.to_rfc3339()),
            last_error: job.last_error,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<JobErrorResponse>) {
    (
        status,
        Json(JobErrorResponse {
            error: error.into(),
        }),
    )
}

fn store_error(e: JobStoreError) -> (StatusCode, Json<JobErrorResponse>) {
    let status = match &e {
        JobStoreError::NotFound(_) => StatusCode::NOT_FOUND,
        JobStoreError::Conflict { .. } | JobStoreError::Active { .. } => StatusCode::CONFLICT,
        JobStoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

fn orchestrator_error(e: OrchestratorError) -> (StatusCode, Json<JobErrorResponse>) {
    let status = match &e {
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Conflict { .. } => StatusCode::CONFLICT,
        OrchestratorError::SourceUnresolved(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Spawn(_) | OrchestratorError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}

/// Encoder parameter bounds accepted over the API.
const MAX_BITRATE_KBPS: u32 = 50_000;
const MAX_FPS: u32 = 120;

fn validate_body(title: &str, source: &SourceRef) -> Result<(), (StatusCode, Json<JobErrorResponse>)> {
    if title.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "title must not be empty"));
    }
    match source {
        SourceRef::Asset { name } if name.trim().is_empty() => Err(error_response(
            StatusCode::BAD_REQUEST,
            "source asset name must not be empty",
        )),
        SourceRef::Playlist { names } if names.is_empty() => Err(error_response(
            StatusCode::BAD_REQUEST,
            "playlist must contain at least one asset",
        )),
        _ => Ok(()),
    }
}

fn validate_encode(params: &EncodeParams) -> Result<(), (StatusCode, Json<JobErrorResponse>)> {
    if params.bitrate_kbps == 0 || params.bitrate_kbps > MAX_BITRATE_KBPS {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("bitrate_kbps must be between 1 and {}", MAX_BITRATE_KBPS),
        ));
    }
    if params.fps == 0 || params.fps > MAX_FPS {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("fps must be between 1 and {}", MAX_FPS),
        ));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new job. The platform label is derived from the RTMP URL.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<JobResponse>), impl IntoResponse> {
    if body.owner_id.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "owner_id must not be empty",
        ));
    }
    validate_body(&body.title, &body.source)?;
    validate_encode(&body.encode)?;

    let request = CreateJobRequest {
        owner_id: body.owner_id,
        title: body.title,
        platform: platform::classify(&body.destination.rtmp_url).to_string(),
        source: body.source,
        destination: body.destination,
        encode: body.encode,
        schedule: body.schedule,
    };

    match state.job_store().create(request) {
        Ok(job) => Ok((StatusCode::CREATED, Json(JobResponse::from(job)))),
        Err(e) => Err(store_error(e)),
    }
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.job_store().get(&id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", id),
        )),
        Err(e) => Err(store_error(e)),
    }
}

/// List jobs with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut filter = JobFilter::new().with_limit(limit);

    if let Some(offset) = params.offset {
        filter = filter.with_offset(offset);
    }

    if let Some(owner_id) = params.owner_id {
        filter = filter.with_owner(owner_id);
    }

    if let Some(ref status) = params.status {
        match JobStatus::parse(status) {
            Some(status) => filter = filter.with_status(status),
            None => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown status: {}", status),
                ));
            }
        }
    }

    match state.job_store().list(&filter) {
        Ok(jobs) => {
            let jobs: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();
            Ok(Json(ListJobsResponse {
                total: jobs.len(),
                jobs,
            }))
        }
        Err(e) => Err(store_error(e)),
    }
}

/// Update job settings. Refused while the job is live or stopping.
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateJobBody>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    if let Some(ref title) = body.title {
        if title.trim().is_empty() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "title must not be empty",
            ));
        }
    }
    if let Some(ref encode) = body.encode {
        validate_encode(encode)?;
    }

    // A new destination re-derives the platform label
    let platform = body
        .destination
        .as_ref()
        .map(|d| platform::classify(&d.rtmp_url).to_string());

    let request = UpdateJobRequest {
        title: body.title,
        platform,
        source: body.source,
        destination: body.destination,
        encode: body.encode,
        schedule: body.schedule,
    };

    match state.job_store().update_settings(&id, request) {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(store_error(e)),
    }
}

/// Delete a job; a live job is stopped first
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.orchestrator().delete(&id).await {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(orchestrator_error(e)),
    }
}

/// Start the encoder for a job
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.orchestrator().start(&id).await {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(orchestrator_error(e)),
    }
}

/// Stop a job. Idempotent: stopping an inactive job succeeds.
pub async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    if let Err(e) = state.orchestrator().stop(&id).await {
        return Err(orchestrator_error(e));
    }

    match state.orchestrator().status(&id) {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(orchestrator_error(e)),
    }
}
