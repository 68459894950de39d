//! Access to a completed job's files.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use forge_core::{Job, JobId, JobMetadata, JobState};
use serde::Serialize;

use crate::jobs::parse_id;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct BundleResponse {
    pub job_id: JobId,
    pub files: BTreeMap<String, String>,
    pub metadata: JobMetadata,
}

async fn completed_job(state: &AppState, id: &str) -> Result<Job, ApiError> {
    let job = state.jobs.get(parse_id(id)?).await?;
    if job.state != JobState::Completed {
        return Err(ApiError::BadRequest("Job not completed yet".to_string()));
    }
    Ok(job)
}

/// GET /api/v1/jobs/:id/bundle
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BundleResponse>, ApiError> {
    let job = completed_job(&state, &id).await?;
    let files = state.artifacts.read_bundle(job.id, &job.result_files).await?;
    Ok(Json(BundleResponse {
        job_id: job.id,
        files,
        metadata: job.metadata,
    }))
}

/// GET /api/v1/jobs/:id/files/*name
pub async fn get_file(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let job = completed_job(&state, &id).await?;
    let name = name.trim_start_matches('/');
    if !job.result_files.iter().any(|f| f == name) {
        return Err(ApiError::NotFound(format!("File not found: {name}")));
    }
    let content = state.artifacts.read_file(job.id, name).await?;
    Ok(([(header::CONTENT_TYPE, mime_type(name))], content))
}

/// MIME type by file extension, defaulting to plain text.
fn mime_type(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "md" => "text/markdown; charset=utf-8",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        _ => "text/plain; charset=utf-8",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("index.HTML"), "text/html; charset=utf-8");
        assert_eq!(mime_type("assets/app.js"), "text/javascript; charset=utf-8");
        assert_eq!(mime_type("Makefile"), "text/plain; charset=utf-8");
    }
}
