//! Message types for actor communication.

use std::collections::BTreeMap;
use std::sync::Arc;

use forge_core::{Job, JobError, JobFilter, JobId, JobKind, JobList, JobPatch};
use ractor::RpcReplyPort;

use crate::LogChannel;

/// Messages for the JobStoreActor.
#[derive(Debug)]
pub enum StoreMessage {
    /// Allocate a pending job and its log channel.
    Create {
        kind: JobKind,
        config: BTreeMap<String, String>,
        reply: RpcReplyPort<Job>,
    },

    /// Start the runner for a pending job.
    Dispatch {
        job_id: JobId,
        reply: RpcReplyPort<Result<(), JobError>>,
    },

    /// Get a snapshot of a job.
    Get {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Merge a patch into a job.
    Update {
        job_id: JobId,
        patch: Box<JobPatch>,
        reply: RpcReplyPort<Result<Job, JobError>>,
    },

    /// Remove a job, its log channel and its artifacts.
    Delete {
        job_id: JobId,
        reply: RpcReplyPort<Result<Job, JobError>>,
    },

    /// List jobs, newest first.
    List {
        filter: JobFilter,
        reply: RpcReplyPort<JobList>,
    },

    /// Get a job's log channel.
    Channel {
        job_id: JobId,
        reply: RpcReplyPort<Option<Arc<LogChannel>>>,
    },

    /// Stop the store.
    Shutdown,
}

/// Messages for the RunnerActor.
#[derive(Debug)]
pub enum RunnerMessage {
    /// Execute the job. Sent once, by the runner to itself.
    Run,
}
