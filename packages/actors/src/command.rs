//! Pipeline backed by an external program.

use std::path::PathBuf;
use std::process::Stdio;

use extract::RawOutput;
use forge_core::JobKind;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process;

use crate::pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineFuture, PipelineResult, Progress,
};

/// Runs a program once per job.
///
/// The job configuration is written to stdin as a JSON object and exported as
/// `FORGE_<KEY>` environment variables. Each stderr line becomes an INFO log
/// line. Stdout is read as a JSON array with one element per task output;
/// anything else is taken whole as a single text output.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    kind: JobKind,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    required_files: Vec<String>,
}

impl CommandPipeline {
    pub fn new(kind: JobKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            required_files: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
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

impl Pipeline for CommandPipeline {
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn required_files(&self) -> &[String] {
        &self.required_files
    }

    fn run(&self, config: PipelineConfig, progress: Progress) -> PipelineFuture {
        Box::pin(run_command(self.clone(), config, progress))
    }
}

/// `theme-color` becomes `FORGE_THEME_COLOR`.
fn env_key(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("FORGE_{key}")
}

async fn run_command(
    cmd: CommandPipeline,
    config: PipelineConfig,
    progress: Progress,
) -> PipelineResult {
    let payload =
        serde_json::to_vec(&config).map_err(|e| PipelineError::Failed(e.to_string()))?;

    let mut command = process::Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .envs(config.iter().map(|(key, value)| (env_key(key), value)))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &cmd.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| PipelineError::Launch {
        program: cmd.program.clone(),
        source,
    })?;
    progress.info(format!("Launched {}", cmd.program));

    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            // The program may exit without reading its input.
            let _ = stdin.write_all(&payload).await;
        });
    }

    let stderr_task = child.stderr.take().map(|stderr| {
        let progress = progress.clone();
        tokio::spawn(async move {
            let mut last = None;
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                progress.info(line.clone());
                last = Some(line);
            }
            last
        })
    });

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_string(&mut stdout).await?;
    }
    let status = child.wait().await?;
    let last_stderr = match stderr_task {
        Some(task) => task.await.ok().flatten(),
        None => None,
    };

    if !status.success() {
        return Err(PipelineError::Exit {
            status: status.to_string(),
            detail: last_stderr.unwrap_or_else(|| "no diagnostic output".to_string()),
        });
    }
    Ok(parse_outputs(&stdout))
}

fn parse_outputs(stdout: &str) -> Vec<RawOutput> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items.into_iter().map(RawOutput::from).collect(),
        _ => vec![RawOutput::Text(stdout.to_string())],
    }
}
