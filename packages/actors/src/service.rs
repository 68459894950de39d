//! Facade over the job store for callers outside the actor system.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use forge_core::{Job, JobError, JobFilter, JobId, JobKind, JobList, LogLevel, LogLine, StreamEvent};
use futures_util::Stream;
use ractor::{Actor, ActorRef, RpcReplyPort, SpawnErr};
use storage::ArtifactStore;
use tokio::task::JoinHandle;

use crate::LogChannel;
use crate::log_channel::DEFAULT_LIVE_CAPACITY;
use crate::messages::StoreMessage;
use crate::pipeline::PipelineRegistry;
use crate::store_actor::{JobStoreActor, JobStoreArgs};
use crate::stream::{DEFAULT_HEARTBEAT, event_stream};

/// Tunables for the job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Idle interval after which a log stream sends a heartbeat.
    pub heartbeat: Duration,
    /// Live feed capacity of each job's log channel.
    pub log_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            heartbeat: DEFAULT_HEARTBEAT,
            log_capacity: DEFAULT_LIVE_CAPACITY,
        }
    }
}

/// Handle to a running job store.
///
/// Cheap to clone; every clone talks to the same store.
#[derive(Clone)]
pub struct JobService {
    store: ActorRef<StoreMessage>,
    config: ServiceConfig,
}

impl JobService {
    /// Spawn the job store.
    pub async fn start(
        pipelines: PipelineRegistry,
        artifacts: ArtifactStore,
        config: ServiceConfig,
    ) -> Result<(Self, JoinHandle<()>), SpawnErr> {
        let args = JobStoreArgs {
            pipelines,
            artifacts,
            log_capacity: config.log_capacity,
        };
        let (store, handle) = Actor::spawn(None, JobStoreActor, args).await?;
        Ok((Self { store, config }, handle))
    }

    pub fn config(&self) -> ServiceConfig {
        self.config
    }

    async fn request<T, F>(&self, build: F) -> Result<T, JobError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> StoreMessage,
    {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.store
            .send_message(build(tx.into()))
            .map_err(|e| JobError::Unavailable(format!("failed to send message: {e}")))?;
        rx.await
            .map_err(|_| JobError::Unavailable("failed to receive response".to_string()))
    }

    /// Allocate a pending job without starting it.
    pub async fn create(
        &self,
        kind: JobKind,
        config: BTreeMap<String, String>,
    ) -> Result<Job, JobError> {
        self.request(|reply| StoreMessage::Create {
            kind,
            config,
            reply,
        })
        .await
    }

    /// Start the runner for a pending job.
    pub async fn dispatch(&self, job_id: JobId) -> Result<(), JobError> {
        self.request(|reply| StoreMessage::Dispatch { job_id, reply })
            .await?
    }

    /// Create a job and start it. Returns the job as created.
    pub async fn submit(
        &self,
        kind: JobKind,
        config: BTreeMap<String, String>,
    ) -> Result<Job, JobError> {
        let job = self.create(kind, config).await?;
        self.dispatch(job.id).await?;
        tracing::info!("Submitted {} job {}", job.kind, job.id);
        Ok(job)
    }

    pub async fn get(&self, job_id: JobId) -> Result<Job, JobError> {
        self.request(|reply| StoreMessage::Get { job_id, reply })
            .await?
            .ok_or(JobError::NotFound(job_id))
    }

    /// Delete a job with its log and artifacts. A running job keeps running
    /// but its result is discarded.
    pub async fn delete(&self, job_id: JobId) -> Result<Job, JobError> {
        self.request(|reply| StoreMessage::Delete { job_id, reply })
            .await?
    }

    pub async fn list(&self, filter: JobFilter) -> Result<JobList, JobError> {
        self.request(|reply| StoreMessage::List { filter, reply })
            .await
    }

    pub async fn channel(&self, job_id: JobId) -> Result<Arc<LogChannel>, JobError> {
        self.request(|reply| StoreMessage::Channel { job_id, reply })
            .await?
            .ok_or(JobError::NotFound(job_id))
    }

    /// Append a line to a job's log.
    pub async fn append_log(
        &self,
        job_id: JobId,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Result<LogLine, JobError> {
        Ok(self.channel(job_id).await?.append(level, message))
    }

    /// Full log history of a job.
    pub async fn logs(&self, job_id: JobId) -> Result<Vec<LogLine>, JobError> {
        Ok(self.channel(job_id).await?.history())
    }

    /// Replay-then-tail stream of a job's log.
    pub async fn subscribe(
        &self,
        job_id: JobId,
    ) -> Result<impl Stream<Item = StreamEvent> + Send + 'static + use<>, JobError> {
        let channel = self.channel(job_id).await?;
        Ok(event_stream(channel, self.config.heartbeat))
    }

    /// Wait for a job to reach a terminal state and return it.
    pub async fn wait_until_finished(&self, job_id: JobId) -> Result<Job, JobError> {
        let mut state = self.channel(job_id).await?.subscribe().state;
        loop {
            let current = *state.borrow_and_update();
            match current {
                None => return Err(JobError::Deleted(job_id)),
                Some(s) if s.is_terminal() => return self.get(job_id).await,
                Some(_) => {}
            }
            if state.changed().await.is_err() {
                return Err(JobError::Deleted(job_id));
            }
        }
    }

    /// Stop the store. Running jobs are abandoned.
    pub fn shutdown(&self) -> Result<(), JobError> {
        self.store
            .send_message(StoreMessage::Shutdown)
            .map_err(|e| JobError::Unavailable(e.to_string()))
    }
}
