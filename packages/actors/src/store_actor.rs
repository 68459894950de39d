//! Job store actor: the single owner of every job record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use forge_core::{Job, JobError, JobFilter, JobId, JobList, JobPatch, JobState};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use storage::ArtifactStore;

use crate::LogChannel;
use crate::messages::{RunnerMessage, StoreMessage};
use crate::pipeline::PipelineRegistry;
use crate::runner_actor::{RunnerActor, RunnerArgs};

/// Arguments for starting the store.
pub struct JobStoreArgs {
    pub pipelines: PipelineRegistry,
    pub artifacts: ArtifactStore,
    /// Live feed capacity of each job's log channel.
    pub log_capacity: usize,
}

/// State for the job store actor.
pub struct JobStoreState {
    jobs: HashMap<JobId, Job>,
    channels: HashMap<JobId, Arc<LogChannel>>,
    runners: HashMap<JobId, ActorRef<RunnerMessage>>,
    /// Reverse index used to map supervision events back to jobs.
    runner_jobs: HashMap<ActorId, JobId>,
    /// Ids deleted while their runner was still alive. Updates for these
    /// report `Deleted` instead of `NotFound` until the runner exits.
    tombstones: HashSet<JobId>,
    pipelines: PipelineRegistry,
    artifacts: ArtifactStore,
    log_capacity: usize,
}

impl JobStoreState {
    fn new(args: JobStoreArgs) -> Self {
        Self {
            jobs: HashMap::new(),
            channels: HashMap::new(),
            runners: HashMap::new(),
            runner_jobs: HashMap::new(),
            tombstones: HashSet::new(),
            pipelines: args.pipelines,
            artifacts: args.artifacts,
            log_capacity: args.log_capacity,
        }
    }

    fn missing(&self, job_id: JobId) -> JobError {
        if self.tombstones.contains(&job_id) {
            JobError::Deleted(job_id)
        } else {
            JobError::NotFound(job_id)
        }
    }

    /// Apply a patch and publish the resulting state to the job's channel.
    fn update(&mut self, job_id: JobId, patch: JobPatch) -> Result<Job, JobError> {
        let missing = self.missing(job_id);
        let job = self.jobs.get_mut(&job_id).ok_or(missing)?;
        job.apply(patch)?;
        if let Some(channel) = self.channels.get(&job_id) {
            channel.set_state(job.state);
        }
        Ok(job.clone())
    }

    /// Force a non-terminal job into `failed`, logging the cause.
    fn fail(&mut self, job_id: JobId, cause: String) {
        let Some(state) = self.jobs.get(&job_id).map(|job| job.state) else {
            return;
        };
        if state.is_terminal() {
            return;
        }
        if let Some(channel) = self.channels.get(&job_id) {
            channel.error(format!("Error: {cause}"));
        }
        if state == JobState::Pending
            && let Err(e) = self.update(job_id, JobPatch::processing())
        {
            tracing::warn!("Failed to advance job {}: {}", job_id, e);
        }
        if let Err(e) = self.update(job_id, JobPatch::failed(cause)) {
            tracing::warn!("Failed to mark job {} failed: {}", job_id, e);
        }
    }

    /// Forget a runner that has stopped, returning the job it ran.
    fn runner_exited(&mut self, runner: &ActorId) -> Option<JobId> {
        let job_id = self.runner_jobs.remove(runner)?;
        self.runners.remove(&job_id);
        self.tombstones.remove(&job_id);
        Some(job_id)
    }

    fn list(&self, filter: JobFilter) -> JobList {
        let mut jobs: Vec<Job> = self
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        let total = jobs.len();
        jobs.truncate(filter.limit);
        JobList { total, jobs }
    }
}

/// Owns job records and log channels, and supervises one runner per
/// dispatched job.
///
/// Every mutation goes through this actor's mailbox, so updates to a job are
/// applied one at a time and readers always see a consistent snapshot.
pub struct JobStoreActor;

impl Actor for JobStoreActor {
    type Msg = StoreMessage;
    type State = JobStoreState;
    type Arguments = JobStoreArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting job store with pipelines for {:?}",
            args.pipelines.kinds()
        );
        Ok(JobStoreState::new(args))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StoreMessage::Create {
                kind,
                config,
                reply,
            } => {
                let job = Job::new(kind, config);
                let channel = Arc::new(LogChannel::new(job.id, state.log_capacity));
                channel.info(format!("Job {} created", job.id));
                state.channels.insert(job.id, channel);
                state.jobs.insert(job.id, job.clone());
                let _ = reply.send(job);
            }

            StoreMessage::Dispatch { job_id, reply } => {
                let Some(job) = state.jobs.get(&job_id).cloned() else {
                    let _ = reply.send(Err(state.missing(job_id)));
                    return Ok(());
                };
                if job.state != JobState::Pending || state.runners.contains_key(&job_id) {
                    let _ = reply.send(Err(JobError::InvalidTransition {
                        job_id,
                        from: job.state,
                        to: JobState::Processing,
                    }));
                    return Ok(());
                }
                let Some(channel) = state.channels.get(&job_id).cloned() else {
                    let _ = reply.send(Err(JobError::NotFound(job_id)));
                    return Ok(());
                };

                let pipeline = state.pipelines.get(job.kind);
                let args = RunnerArgs {
                    required_files: pipeline
                        .as_ref()
                        .map(|p| p.required_files().to_vec())
                        .unwrap_or_default(),
                    pipeline,
                    job,
                    store: myself.clone(),
                    channel,
                    artifacts: state.artifacts.clone(),
                };

                match Actor::spawn_linked(None, RunnerActor, args, myself.get_cell()).await {
                    Ok((runner, _)) => {
                        state.runner_jobs.insert(runner.get_id(), job_id);
                        state.runners.insert(job_id, runner);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        tracing::error!("Failed to spawn runner for job {}: {}", job_id, e);
                        state.fail(job_id, format!("Failed to start runner: {e}"));
                        let _ = reply.send(Ok(()));
                    }
                }
            }

            StoreMessage::Get { job_id, reply } => {
                let _ = reply.send(state.jobs.get(&job_id).cloned());
            }

            StoreMessage::Update {
                job_id,
                patch,
                reply,
            } => {
                let _ = reply.send(state.update(job_id, *patch));
            }

            StoreMessage::Delete { job_id, reply } => {
                let Some(job) = state.jobs.remove(&job_id) else {
                    let _ = reply.send(Err(state.missing(job_id)));
                    return Ok(());
                };
                if state.runners.contains_key(&job_id) {
                    state.tombstones.insert(job_id);
                }
                if let Some(channel) = state.channels.remove(&job_id) {
                    channel.close();
                }
                let artifacts = state.artifacts.clone();
                tokio::spawn(async move {
                    match artifacts.remove_job(job_id).await {
                        Ok(removed) if removed > 0 => {
                            tracing::info!("Removed {} artifact(s) of job {}", removed, job_id);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Failed to remove artifacts of job {}: {}", job_id, e)
                        }
                    }
                });
                tracing::info!("Deleted job {}", job_id);
                let _ = reply.send(Ok(job));
            }

            StoreMessage::List { filter, reply } => {
                let _ = reply.send(state.list(filter));
            }

            StoreMessage::Channel { job_id, reply } => {
                let _ = reply.send(state.channels.get(&job_id).cloned());
            }

            StoreMessage::Shutdown => {
                tracing::info!("Shutting down job store");
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let (cell, cause) = match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                let cause = match reason {
                    Some(reason) => format!("Runner terminated unexpectedly: {reason}"),
                    None => "Runner terminated unexpectedly".to_string(),
                };
                (cell, cause)
            }
            SupervisionEvent::ActorFailed(cell, err) => (cell, format!("Runner crashed: {err}")),
            _ => return Ok(()),
        };

        let Some(job_id) = state.runner_exited(&cell.get_id()) else {
            return Ok(());
        };
        // A runner that finished normally has already moved its job to a
        // terminal state, so this only fires for runners that died mid-job.
        state.fail(job_id, cause);
        Ok(())
    }
}
