#![allow(dead_code)]

use std::error::Error;
use std::time::Duration;

use actors::{
    FnPipeline, JobService, PipelineConfig, PipelineFuture, PipelineRegistry, Progress,
    ServiceConfig,
};
use extract::RawOutput;
use forge_core::{JobKind, StreamEvent};
use storage::{ArtifactStore, StorageConfig};

pub type TestResult = Result<(), Box<dyn Error>>;

pub fn memory_store() -> Result<ArtifactStore, Box<dyn Error>> {
    Ok(ArtifactStore::new(StorageConfig::memory())?)
}

/// A pipeline that logs one line and returns `outputs` unchanged.
pub fn fixed(
    kind: JobKind,
    outputs: Vec<RawOutput>,
) -> FnPipeline<impl Fn(PipelineConfig, Progress) -> PipelineFuture + Send + Sync + 'static> {
    FnPipeline::new(kind, move |_config, progress: Progress| {
        let outputs = outputs.clone();
        Box::pin(async move {
            progress.info("Generating files");
            Ok(outputs)
        }) as PipelineFuture
    })
}

pub async fn start(
    pipelines: PipelineRegistry,
) -> Result<(JobService, ArtifactStore), Box<dyn Error>> {
    let artifacts = memory_store()?;
    let config = ServiceConfig {
        heartbeat: Duration::from_millis(50),
        ..ServiceConfig::default()
    };
    let (jobs, _handle) = JobService::start(pipelines, artifacts.clone(), config).await?;
    Ok((jobs, artifacts))
}

/// Log messages carried by `events`, with the time and level prefix removed.
pub fn log_messages(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Log { message } => Some(
                message
                    .split_once(": ")
                    .map_or(message.clone(), |(_, rest)| rest.to_string()),
            ),
            _ => None,
        })
        .collect()
}
