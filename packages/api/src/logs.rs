//! Log history and live log streaming.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use forge_core::{JobId, JobState, StreamEvent};
use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::jobs::parse_id;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub job_id: JobId,
    pub status: JobState,
    /// Rendered lines, oldest first.
    pub logs: Vec<String>,
    pub total_logs: usize,
}

/// GET /api/v1/jobs/:id/logs
pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LogsResponse>, ApiError> {
    let job_id = parse_id(&id)?;
    let job = state.jobs.get(job_id).await?;
    let logs: Vec<String> = state
        .jobs
        .logs(job_id)
        .await?
        .iter()
        .map(|line| line.render())
        .collect();

    Ok(Json(LogsResponse {
        job_id,
        status: job.state,
        total_logs: logs.len(),
        logs,
    }))
}

fn to_sse(event: StreamEvent) -> Option<Event> {
    match serde_json::to_string(&event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            tracing::warn!("SSE: Failed to serialize {} event: {}", event.event_type(), e);
            None
        }
    }
}

/// GET /api/v1/jobs/:id/logs/stream
///
/// Every event is a JSON `data:` payload tagged by `type`: `connected`, then
/// `log` lines and `heartbeat`s, and a final `status` when the job finishes.
pub async fn stream_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let job_id = parse_id(&id)?;
    let events = state.jobs.subscribe(job_id).await?;
    tracing::info!("SSE client connected to job {}", job_id);

    let stream = events.filter_map(|event| async move { to_sse(event).map(Ok) });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
