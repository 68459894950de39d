//! Actor system for generation jobs.
//!
//! This crate provides the Ractor-based actors that run jobs, plus the
//! per-job log channels their progress flows through.
//!
//! # Architecture
//!
//! - `JobStoreActor` - Owns every job record and log channel; supervises runners
//! - `RunnerActor` - Runs one job's pipeline, extracts and materializes its files
//! - `LogChannel` - Append-only history plus a bounded live feed for one job
//! - `event_stream` - Replay-then-tail view of a log channel
//!
//! # Usage
//!
//! ```ignore
//! use actors::{JobService, PipelineRegistry, ServiceConfig};
//!
//! let (jobs, _handle) = JobService::start(pipelines, artifacts, ServiceConfig::default()).await?;
//! let job = jobs.submit(JobKind::Ui, config).await?;
//! let events = jobs.subscribe(job.id).await?;
//! ```

mod command;
mod log_channel;
mod messages;
mod pipeline;
mod runner_actor;
mod service;
mod store_actor;
mod stream;

pub use command::CommandPipeline;
pub use log_channel::{DEFAULT_LIVE_CAPACITY, LogChannel, Subscription};
pub use pipeline::{
    FnPipeline, Pipeline, PipelineConfig, PipelineError, PipelineFuture, PipelineRegistry,
    PipelineResult, Progress,
};
pub use service::{JobService, ServiceConfig};
pub use stream::{DEFAULT_HEARTBEAT, event_stream};
