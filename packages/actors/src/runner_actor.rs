//! Runner actor: executes one job from pipeline to materialized bundle.

use std::collections::HashMap;
use std::sync::Arc;

use forge_core::{DroppedOutput, FileUnit, Job, JobError, JobId, JobPatch};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use storage::ArtifactStore;

use crate::LogChannel;
use crate::messages::{RunnerMessage, StoreMessage};
use crate::pipeline::{Pipeline, Progress};

/// Runner actor arguments.
pub struct RunnerArgs {
    /// Snapshot of the job at dispatch.
    pub job: Job,
    /// `None` when no pipeline is registered for the job's kind.
    pub pipeline: Option<Arc<dyn Pipeline>>,
    pub required_files: Vec<String>,
    pub store: ActorRef<StoreMessage>,
    pub channel: Arc<LogChannel>,
    pub artifacts: ArtifactStore,
}

/// Runs a single job, then stops.
///
/// The runner reports progress to the job's log channel and state changes to
/// the store. It never touches the job record directly.
pub struct RunnerActor;

impl Actor for RunnerActor {
    type Msg = RunnerMessage;
    type State = RunnerArgs;
    type Arguments = RunnerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting runner for job {}", args.job.id);
        myself.send_message(RunnerMessage::Run)?;
        Ok(args)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RunnerMessage::Run => {
                let job_id = state.job.id;
                match run_job(state).await {
                    Ok(patch) => finish(state, patch).await,
                    Err(e @ (JobError::Deleted(_) | JobError::NotFound(_))) => {
                        tracing::info!("Runner for job {} stopping: {}", job_id, e);
                    }
                    Err(e) => {
                        state.channel.error(format!("Error: {e}"));
                        if let Err(e) =
                            update_job(&state.store, job_id, JobPatch::failed(e.to_string())).await
                        {
                            tracing::warn!("Failed to mark job {} failed: {}", job_id, e);
                        }
                    }
                }
                myself.stop(None);
            }
        }
        Ok(())
    }
}

/// Drive the job up to, but not including, its completion update.
async fn run_job(state: &RunnerArgs) -> Result<JobPatch, JobError> {
    let job = &state.job;
    let channel = &state.channel;

    update_job(&state.store, job.id, JobPatch::processing()).await?;
    channel.info(format!("Starting {} generation job {}", job.kind, job.id));
    for (key, value) in &job.metadata.config {
        channel.info(format!("Configuration: {key} = {value}"));
    }

    let pipeline = state.pipeline.as_ref().ok_or_else(|| {
        JobError::PipelineFailure(format!("no pipeline registered for kind {}", job.kind))
    })?;

    let outputs = pipeline
        .run(
            job.metadata.config.clone(),
            Progress::new(channel.clone()),
        )
        .await
        .map_err(|e| JobError::PipelineFailure(e.to_string()))?;
    if outputs.is_empty() {
        return Err(JobError::PipelineFailure(
            "pipeline produced no outputs".to_string(),
        ));
    }
    channel.info(format!("Pipeline returned {} output(s)", outputs.len()));

    let mut recovered = Vec::new();
    let mut dropped = Vec::new();
    for (slot, raw) in outputs.iter().enumerate() {
        match extract::extract_files(raw) {
            Ok(extracted) => {
                channel.info(format!(
                    "Output {}: recovered {} file(s) via {}",
                    slot,
                    extracted.value.len(),
                    extracted.strategy
                ));
                recovered.extend(extracted.value);
            }
            Err(e) => {
                channel.warning(format!("Output {slot} dropped: {e}"));
                dropped.push(DroppedOutput {
                    slot,
                    reason: e.to_string(),
                });
            }
        }
    }

    let files = merge_files(recovered);
    if files.is_empty() {
        return Err(JobError::PipelineFailure(
            "no usable files in pipeline output".to_string(),
        ));
    }

    let location = state
        .artifacts
        .write_bundle(job.id, &files)
        .await
        .map_err(|e| JobError::Materialization(e.to_string()))?;
    channel.info(format!("Wrote {} file(s) to {}", files.len(), location));

    let report = extract::verify(&files, &state.required_files);
    if report.passed {
        channel.info(report.summary());
    } else {
        channel.warning(report.summary());
    }
    for issue in &report.issues {
        channel.warning(issue.clone());
    }

    channel.success(format!(
        "Generated {} file(s) for job {}",
        files.len(),
        job.id
    ));
    let names = files.into_iter().map(|unit| unit.name).collect();
    Ok(JobPatch::completed(location, names, report).with_dropped_outputs(dropped))
}

/// Commit the completion. If the store rejects it, the job was deleted or
/// moved on without this runner, so the materialized files are removed.
async fn finish(state: &RunnerArgs, patch: JobPatch) {
    let job_id = state.job.id;
    let rejection = match update_job(&state.store, job_id, patch).await {
        Ok(_) => {
            tracing::info!("Job {} completed", job_id);
            return;
        }
        Err(e @ (JobError::Deleted(_) | JobError::NotFound(_))) => {
            tracing::info!("Discarding result of job {}: {}", job_id, e);
            e
        }
        Err(e) => {
            tracing::warn!("Failed to complete job {}: {}", job_id, e);
            e
        }
    };
    match state.artifacts.remove_job(job_id).await {
        Ok(removed) => tracing::debug!(
            "Removed {} artifact(s) of job {} after {}",
            removed,
            job_id,
            rejection
        ),
        Err(e) => tracing::warn!("Failed to remove artifacts of job {}: {}", job_id, e),
    }
}

/// Normalize names and drop duplicates. A later file replaces an earlier one
/// with the same name but keeps the earlier position.
fn merge_files(units: Vec<FileUnit>) -> Vec<FileUnit> {
    let mut files: Vec<FileUnit> = Vec::with_capacity(units.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for mut unit in units {
        let Some(name) = unit.normalized_name() else {
            continue;
        };
        unit.name = name;
        match index.get(&unit.name) {
            Some(&at) => files[at] = unit,
            None => {
                index.insert(unit.name.clone(), files.len());
                files.push(unit);
            }
        }
    }
    files
}

async fn update_job(
    store: &ActorRef<StoreMessage>,
    job_id: JobId,
    patch: JobPatch,
) -> Result<Job, JobError> {
    let result = ractor::rpc::call(
        store,
        |reply| StoreMessage::Update {
            job_id,
            patch: Box::new(patch),
            reply,
        },
        None,
    )
    .await;
    match result {
        Ok(CallResult::Success(updated)) => updated,
        Ok(_) => Err(JobError::Unavailable("job store did not reply".to_string())),
        Err(e) => Err(JobError::Unavailable(e.to_string())),
    }
}
