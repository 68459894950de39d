//! Server configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use actors::{CommandPipeline, DEFAULT_LIVE_CAPACITY, PipelineRegistry, ServiceConfig};
use forge_core::{JobError, JobKind};
use serde::Deserialize;
use storage::{StorageConfig, StorageError};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid pipeline section: {0}")]
    Pipeline(#[from] JobError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How to launch the generator for one job kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineSection {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// File names every bundle of this kind must contain.
    #[serde(default)]
    pub required_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgeConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Falls back to `ARTIFACT_*` environment variables when absent.
    #[serde(default)]
    pub artifacts: Option<StorageConfig>,
    /// Keyed by job kind.
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineSection>,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_heartbeat_ms() -> u64 {
    1000
}

fn default_log_capacity() -> usize {
    DEFAULT_LIVE_CAPACITY
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            heartbeat_ms: default_heartbeat_ms(),
            log_capacity: default_log_capacity(),
            artifacts: None,
            pipelines: BTreeMap::new(),
        }
    }
}

impl ForgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn service(&self) -> ServiceConfig {
        ServiceConfig {
            heartbeat: Duration::from_millis(self.heartbeat_ms.max(1)),
            log_capacity: self.log_capacity.max(1),
        }
    }

    pub fn storage(&self) -> Result<StorageConfig, ConfigError> {
        match &self.artifacts {
            Some(cfg) => Ok(cfg.clone()),
            None => Ok(StorageConfig::from_env()?),
        }
    }

    /// One command pipeline per configured kind.
    pub fn pipelines(&self) -> Result<PipelineRegistry, ConfigError> {
        let mut registry = PipelineRegistry::new();
        for (kind, section) in &self.pipelines {
            let kind: JobKind = kind.parse()?;
            let mut pipeline = CommandPipeline::new(kind, &section.program)
                .with_args(section.args.iter().cloned())
                .with_required_files(section.required_files.iter().cloned());
            if let Some(dir) = &section.working_dir {
                pipeline = pipeline.with_working_dir(dir);
            }
            registry.register(pipeline);
        }
        Ok(registry)
    }
}
