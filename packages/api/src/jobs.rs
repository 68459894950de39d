//! Job lifecycle endpoints.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use forge_core::{Job, JobFilter, JobId, JobKind, JobList, JobState};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub kind: String,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
    pub status: JobState,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(alias = "type")]
    pub kind: Option<String>,
    #[serde(alias = "status")]
    pub state: Option<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    fn to_filter(&self) -> Result<JobFilter, ApiError> {
        let mut filter = JobFilter::default();
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.is_empty()) {
            filter = filter.with_kind(kind.parse()?);
        }
        if let Some(state) = self.state.as_deref().filter(|s| !s.is_empty()) {
            filter = filter.with_state(state.parse()?);
        }
        if let Some(limit) = self.limit {
            filter = filter.with_limit(limit);
        }
        Ok(filter)
    }
}

pub(crate) fn parse_id(id: &str) -> Result<JobId, ApiError> {
    JobId::parse(id).map_err(|_| ApiError::NotFound("Job not found".to_string()))
}

/// Config values arrive as arbitrary JSON; pipelines take strings.
fn stringify(config: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    config
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/v1/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let kind: JobKind = request.kind.parse()?;
    let job = state.jobs.submit(kind, stringify(request.config)).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id: job.id,
            status: job.state,
            message: format!("{kind} generation job created"),
        }),
    ))
}

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobList>, ApiError> {
    let filter = query.to_filter()?;
    Ok(Json(state.jobs.list(filter).await?))
}

/// GET /api/v1/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job_id = parse_id(&id)?;
    Ok(Json(state.jobs.get(job_id).await?))
}

/// DELETE /api/v1/jobs/:id
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job_id = parse_id(&id)?;
    state.jobs.delete(job_id).await?;
    Ok(Json(json!({ "message": "Job deleted successfully" })))
}
