//! Errors shared by the job store and its callers.

use thiserror::Error;

use crate::{JobId, JobState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {0} was deleted")]
    Deleted(JobId),

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("invalid update for job {job_id}: {reason}")]
    InvalidPatch { job_id: JobId, reason: String },

    #[error("unknown job kind: {0}")]
    UnknownKind(String),

    #[error("unknown job state: {0}")]
    UnknownState(String),

    #[error("pipeline failure: {0}")]
    PipelineFailure(String),

    #[error("materialization error: {0}")]
    Materialization(String),

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}
