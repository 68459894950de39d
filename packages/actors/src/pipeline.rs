//! Generation pipeline trait and registry.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use extract::RawOutput;
use forge_core::{JobKind, LogLevel};

use crate::LogChannel;

/// Caller-supplied configuration handed to a pipeline.
pub type PipelineConfig = BTreeMap<String, String>;

/// Result type for pipelines: one raw output per task.
pub type PipelineResult = Result<Vec<RawOutput>, PipelineError>;

/// Future type for async pipelines.
pub type PipelineFuture = Pin<Box<dyn Future<Output = PipelineResult> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Failed(String),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline exited with {status}: {detail}")]
    Exit { status: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a running pipeline reports progress. Lines land in the job's log.
#[derive(Clone)]
pub struct Progress {
    channel: Arc<LogChannel>,
}

impl Progress {
    pub fn new(channel: Arc<LogChannel>) -> Self {
        Self { channel }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.channel.append(level, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }
}

/// An external generation pipeline.
///
/// Implement this trait to plug a generator in for a job kind. A pipeline may
/// run for an unbounded time; the runner imposes no timeout.
pub trait Pipeline: Send + Sync + 'static {
    /// The job kind this pipeline serves.
    fn kind(&self) -> JobKind;

    /// File names a complete bundle for this kind must contain.
    fn required_files(&self) -> &[String] {
        &[]
    }

    /// Run the pipeline and return its task outputs in order.
    fn run(&self, config: PipelineConfig, progress: Progress) -> PipelineFuture;
}

/// Registry for pipelines.
///
/// Maps job kinds to their pipelines for dynamic dispatch.
#[derive(Default, Clone)]
pub struct PipelineRegistry {
    pipelines: HashMap<JobKind, Arc<dyn Pipeline>>,
}

impl PipelineRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// Register a pipeline for its job kind, replacing any previous one.
    pub fn register<P: Pipeline>(&mut self, pipeline: P) {
        self.pipelines.insert(pipeline.kind(), Arc::new(pipeline));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<P: Pipeline>(mut self, pipeline: P) -> Self {
        self.register(pipeline);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn Pipeline>> {
        self.pipelines.get(&kind).cloned()
    }

    /// List all registered job kinds.
    pub fn kinds(&self) -> Vec<JobKind> {
        let mut kinds: Vec<_> = self.pipelines.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// A simple function-based pipeline.
pub struct FnPipeline<F>
where
    F: Fn(PipelineConfig, Progress) -> PipelineFuture + Send + Sync + 'static,
{
    kind: JobKind,
    required_files: Vec<String>,
    run: F,
}

impl<F> FnPipeline<F>
where
    F: Fn(PipelineConfig, Progress) -> PipelineFuture + Send + Sync + 'static,
{
    pub fn new(kind: JobKind, run: F) -> Self {
        Self {
            kind,
            required_files: Vec::new(),
            run,
        }
    }

    pub fn with_required_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_files = names.into_iter().map(Into::into).collect();
        self
    }
}

impl<F> Pipeline for FnPipeline<F>
where
    F: Fn(PipelineConfig, Progress) -> PipelineFuture + Send + Sync + 'static,
{
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn required_files(&self) -> &[String] {
        &self.required_files
    }

    fn run(&self, config: PipelineConfig, progress: Progress) -> PipelineFuture {
        (self.run)(config, progress)
    }
}
