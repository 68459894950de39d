use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge_core::JobError;
use serde_json::json;
use storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Job(e) => match e {
                JobError::NotFound(_) | JobError::Deleted(_) => StatusCode::NOT_FOUND,
                JobError::UnknownKind(_)
                | JobError::UnknownState(_)
                | JobError::InvalidTransition { .. }
                | JobError::InvalidPatch { .. } => StatusCode::BAD_REQUEST,
                JobError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                JobError::PipelineFailure(_) | JobError::Materialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::UnsafeName(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let message = match &self {
            ApiError::Job(JobError::NotFound(_) | JobError::Deleted(_)) => {
                "Job not found".to_string()
            }
            ApiError::Storage(StorageError::NotFound(name)) => format!("File not found: {name}"),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
