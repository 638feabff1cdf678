use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{assets, handlers, history, jobs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config, metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Jobs
        .route("/jobs", post(jobs::create_job))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}", put(jobs::update_job))
        .route("/jobs/{id}", delete(jobs::delete_job))
        .route("/jobs/{id}/start", post(jobs::start_job))
        .route("/jobs/{id}/stop", post(jobs::stop_job))
        // Session history
        .route("/history", get(history::list_sessions))
        .route("/history/stats", get(history::get_stats))
        // Asset uploads
        .route("/assets", post(assets::upload_asset))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
