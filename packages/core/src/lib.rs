//! Core domain types for the job orchestration system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobState and JobPatch for generation jobs
//! - LogLine and LogLevel for per-job progress logs
//! - FileUnit, FileBundle and VerificationReport for pipeline results
//! - StreamEvent for the live log stream wire format

mod bundle;
mod error;
mod events;
mod job;
mod log;
mod report;

pub use bundle::{FileBundle, FileUnit};
pub use error::JobError;
pub use events::StreamEvent;
pub use job::{
    DroppedOutput, Job, JobFilter, JobId, JobKind, JobList, JobMetadata, JobPatch, JobState,
    DEFAULT_LIST_LIMIT,
};
pub use log::{LogLevel, LogLine};
pub use report::{FileMetrics, SyntaxCheck, SyntaxError, VerificationReport};
