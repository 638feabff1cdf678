//! Asset upload handler.
//!
//! Uploads are the one heavy operation the HTTP surface exposes, so they go
//! through the per-owner concurrency guard: past the configured limit the
//! request is rejected with 429 instead of queued.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use relaycast_core::{media, metrics};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct UploadErrorResponse {
    pub error: String,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
) -> (StatusCode, Json<UploadErrorResponse>) {
    (
        status,
        Json(UploadErrorResponse {
            error: error.into(),
        }),
    )
}

/// Receive one media file into the asset library.
pub async fn upload_asset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), impl IntoResponse> {
    // The slot is held for the whole upload and released on drop.
    let _slot = match state.upload_guard().acquire(&params.owner_id) {
        Ok(slot) => slot,
        Err(e) => {
            metrics::GUARD_REJECTIONS.inc();
            return Err(error_response(StatusCode::TOO_MANY_REQUESTS, e.to_string()));
        }
    };

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "multipart body contains no file",
            ));
        }
        Err(e) => {
            return Err(error_response(StatusCode::BAD_REQUEST, e.to_string()));
        }
    };

    let name = match field.file_name() {
        Some(name) => name.to_string(),
        None => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "file field has no filename",
            ));
        }
    };

    if !media::is_valid_asset_name(&name) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid asset name: {}", name),
        ));
    }

    let data = match field.bytes().await {
        Ok(data) => data,
        Err(e) => {
            return Err(error_response(StatusCode::BAD_REQUEST, e.to_string()));
        }
    };

    let path = state.config().storage.library_dir.join(&name);
    if let Err(e) = tokio::fs::write(&path, &data).await {
        tracing::error!(asset = %name, "failed to write uploaded asset: {}", e);
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to store asset",
        ));
    }

    tracing::info!(
        owner_id = %params.owner_id,
        asset = %name,
        size = data.len(),
        "asset uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            name,
            size_bytes: data.len() as u64,
        }),
    ))
}
