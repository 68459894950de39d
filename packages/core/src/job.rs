//! Job domain types for generation jobs.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{JobError, VerificationReport};

/// Default number of jobs returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Family of generation pipeline a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Static web front-end (markup, styles, scripts).
    Ui,
    /// Multi-agent application scaffold.
    Agent,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Ui, JobKind::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Ui => "ui",
            JobKind::Agent => "agent",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ui" => Ok(JobKind::Ui),
            "agent" => Ok(JobKind::Agent),
            other => Err(JobError::UnknownKind(other.to_string())),
        }
    }
}

/// Current state of a job in its lifecycle.
///
/// States only move forward: `pending -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Job was accepted and waits for its runner.
    #[default]
    Pending,
    /// The runner is executing the pipeline.
    Processing,
    /// Results were materialized and verified.
    Completed,
    /// The pipeline or materialization failed.
    Failed,
}

impl JobState {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether `next` is the legal successor of this state.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }

    /// Get a simple state string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(JobError::UnknownState(other.to_string())),
        }
    }
}

/// A pipeline output slot that produced no usable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedOutput {
    /// Zero-based index of the output in the pipeline result.
    pub slot: usize,
    /// Why extraction gave up on it.
    pub reason: String,
}

/// Free-form data attached to a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Caller-supplied configuration, stored verbatim.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Verification of the produced bundle, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
    /// Output slots omitted from the bundle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_outputs: Vec<DroppedOutput>,
}

/// A job represents one run of a generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Pipeline family.
    pub kind: JobKind,
    /// Current lifecycle state.
    pub state: JobState,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure cause, present only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Locator of the materialized artifacts, present only when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_location: Option<String>,
    /// Relative names of the produced files, in output order.
    #[serde(default)]
    pub result_files: Vec<String>,
    /// Configuration and verification data.
    #[serde(default)]
    pub metadata: JobMetadata,
}

impl Job {
    /// Create a new pending job.
    pub fn new(kind: JobKind, config: BTreeMap<String, String>) -> Self {
        Self {
            id: JobId::new(),
            kind,
            state: JobState::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
            result_location: None,
            result_files: Vec::new(),
            metadata: JobMetadata {
                config,
                ..JobMetadata::default()
            },
        }
    }

    /// Merge a patch into this job.
    ///
    /// The patch is applied as a whole or not at all. State changes must follow
    /// [`JobState::can_advance_to`], `error` must be present exactly when the
    /// job is failed and `result_location` exactly when it is completed.
    pub fn apply(&mut self, patch: JobPatch) -> Result<(), JobError> {
        let mut next = self.clone();

        if let Some(state) = patch.state {
            if !self.state.can_advance_to(state) {
                return Err(JobError::InvalidTransition {
                    job_id: self.id,
                    from: self.state,
                    to: state,
                });
            }
            next.state = state;
            if state.is_terminal() && next.completed_at.is_none() {
                next.completed_at = Some(Utc::now());
            }
        }
        if let Some(error) = patch.error {
            next.error = Some(error);
        }
        if let Some(location) = patch.result_location {
            next.result_location = Some(location);
        }
        if let Some(files) = patch.result_files {
            next.result_files = files;
        }
        if let Some(report) = patch.verification {
            next.metadata.verification = Some(report);
        }
        if !patch.dropped_outputs.is_empty() {
            next.metadata.dropped_outputs.extend(patch.dropped_outputs);
        }

        if next.error.is_some() != (next.state == JobState::Failed) {
            return Err(JobError::InvalidPatch {
                job_id: self.id,
                reason: "error must be set exactly when the job is failed".to_string(),
            });
        }
        if next.result_location.is_some() != (next.state == JobState::Completed) {
            return Err(JobError::InvalidPatch {
                job_id: self.id,
                reason: "result location must be set exactly when the job is completed"
                    .to_string(),
            });
        }

        *self = next;
        Ok(())
    }
}

/// Partial update of a job, applied atomically by the job store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub state: Option<JobState>,
    pub error: Option<String>,
    pub result_location: Option<String>,
    pub result_files: Option<Vec<String>>,
    pub verification: Option<VerificationReport>,
    pub dropped_outputs: Vec<DroppedOutput>,
}

impl JobPatch {
    /// Move the job into `processing`.
    pub fn processing() -> Self {
        Self {
            state: Some(JobState::Processing),
            ..Self::default()
        }
    }

    /// Complete the job with its materialized results.
    pub fn completed(
        location: impl Into<String>,
        files: Vec<String>,
        report: VerificationReport,
    ) -> Self {
        Self {
            state: Some(JobState::Completed),
            result_location: Some(location.into()),
            result_files: Some(files),
            verification: Some(report),
            ..Self::default()
        }
    }

    /// Fail the job with a cause.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: Some(JobState::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Record output slots that were omitted from the bundle.
    pub fn with_dropped_outputs(mut self, dropped: Vec<DroppedOutput>) -> Self {
        self.dropped_outputs = dropped;
        self
    }
}

/// Criteria for listing jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub state: Option<JobState>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            kind: None,
            state: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl JobFilter {
    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Check whether a job passes the kind and state criteria.
    pub fn matches(&self, job: &Job) -> bool {
        self.kind.is_none_or(|kind| job.kind == kind)
            && self.state.is_none_or(|state| job.state == state)
    }
}

/// A page of jobs, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    /// Number of jobs matching the filter before truncation.
    pub total: usize,
    pub jobs: Vec<Job>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn processing_job() -> Job {
        let mut job = Job::new(JobKind::Agent, BTreeMap::new());
        job.apply(JobPatch::processing()).unwrap();
        job
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new(JobKind::Ui, BTreeMap::from([("theme".into(), "dark".into())]));
        assert_eq!(job.state, JobState::Pending);
        assert!(job.completed_at.is_none());
        assert_eq!(job.metadata.config["theme"], "dark");
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let mut job = Job::new(JobKind::Ui, BTreeMap::new());

        let err = job.apply(JobPatch::failed("boom")).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(job.state, JobState::Pending);

        job.apply(JobPatch::processing()).unwrap();
        job.apply(JobPatch::failed("boom")).unwrap();
        assert!(job.completed_at.is_some());

        let err = job.apply(JobPatch::processing()).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(job.state, JobState::Failed);
    }

    #[test]
    fn test_completed_at_is_set_once() {
        let mut job = processing_job();
        job.apply(JobPatch::completed("mem://jobs/x", vec![], VerificationReport::default()))
            .unwrap();
        let first = job.completed_at;
        assert!(first.is_some());

        job.apply(JobPatch::default()).unwrap();
        assert_eq!(job.completed_at, first);
    }

    #[test]
    fn test_failed_requires_error() {
        let mut job = processing_job();
        let patch = JobPatch {
            state: Some(JobState::Failed),
            ..JobPatch::default()
        };
        let err = job.apply(patch).unwrap_err();
        assert!(matches!(err, JobError::InvalidPatch { .. }));
        assert_eq!(job.state, JobState::Processing);
    }

    #[test]
    fn test_completed_requires_location() {
        let mut job = processing_job();
        let patch = JobPatch {
            state: Some(JobState::Completed),
            ..JobPatch::default()
        };
        assert!(job.apply(patch).is_err());
        assert_eq!(job.state, JobState::Processing);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_kind_and_state_parse() {
        assert_eq!("UI".parse::<JobKind>().unwrap(), JobKind::Ui);
        assert_eq!("agent".parse::<JobKind>().unwrap(), JobKind::Agent);
        assert!("video".parse::<JobKind>().is_err());
        assert_eq!("Completed".parse::<JobState>().unwrap(), JobState::Completed);
    }

    #[test]
    fn test_filter_matches() {
        let job = processing_job();
        assert!(JobFilter::default().matches(&job));
        assert!(JobFilter::default().with_kind(JobKind::Agent).matches(&job));
        assert!(!JobFilter::default().with_kind(JobKind::Ui).matches(&job));
        assert!(!JobFilter::default()
            .with_state(JobState::Completed)
            .matches(&job));
    }

    #[test]
    fn test_job_serializes_lowercase_tags() {
        let job = Job::new(JobKind::Agent, BTreeMap::new());
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["kind"], "agent");
        assert_eq!(json["state"], "pending");
        assert!(json.get("error").is_none());
    }
}
