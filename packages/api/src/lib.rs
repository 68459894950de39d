//! HTTP surface for the job service.
//!
//! A thin axum layer: every handler translates a request into a
//! [`JobService`] or [`ArtifactStore`] call and the result back into JSON.
//! Log streams are served as Server-Sent Events.

mod error;
mod files;
mod jobs;
mod logs;

use axum::Router;
use axum::routing::get;

use actors::JobService;
use storage::ArtifactStore;

pub use error::ApiError;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobService,
    pub artifacts: ArtifactStore,
}

impl AppState {
    pub fn new(jobs: JobService, artifacts: ArtifactStore) -> Self {
        Self { jobs, artifacts }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(jobs::health))
        .route("/api/v1/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/api/v1/jobs/:id",
            get(jobs::get_job).delete(jobs::delete_job),
        )
        .route("/api/v1/jobs/:id/logs", get(logs::get_logs))
        .route("/api/v1/jobs/:id/logs/stream", get(logs::stream_logs))
        .route("/api/v1/jobs/:id/bundle", get(files::get_bundle))
        .route("/api/v1/jobs/:id/files/*name", get(files::get_file))
        .with_state(state)
}
