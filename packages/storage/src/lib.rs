//! Artifact storage for generated bundles.
//!
//! Each completed job gets its files written under `jobs/<job_id>/`:
//! - On-disk storage for real runs, so the output directory can be opened directly
//! - In-memory storage for tests
//!
//! This is a small wrapper around `object_store`, which provides both backends
//! behind one interface.

use std::collections::BTreeMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use forge_core::{FileUnit, JobId};
use futures_util::TryStreamExt;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("unsafe artifact name: {0}")]
    UnsafeName(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact {0} is not valid UTF-8")]
    NotText(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackendConfig {
    Filesystem {
        #[serde(default = "default_fs_root")]
        root: PathBuf,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    #[serde(flatten)]
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all artifact keys.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_fs_root() -> PathBuf {
    PathBuf::from("./generated")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::filesystem(default_fs_root())
    }
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackendConfig::Memory,
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackendConfig::Filesystem { root: root.into() },
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `ARTIFACT_BACKEND`: `filesystem` (default) or `memory`
    /// - `ARTIFACT_FS_ROOT`: directory for the filesystem backend (default: `./generated`)
    /// - `ARTIFACT_PREFIX`: optional key prefix, e.g. `staging/`
    pub fn from_env() -> Result<Self, StorageError> {
        let backend = std::env::var("ARTIFACT_BACKEND").ok().and_then(non_empty);
        let prefix = std::env::var("ARTIFACT_PREFIX").ok().and_then(non_empty);

        let cfg = match backend.as_deref() {
            None | Some("filesystem") | Some("fs") => {
                let root = std::env::var("ARTIFACT_FS_ROOT")
                    .ok()
                    .and_then(non_empty)
                    .map(PathBuf::from)
                    .unwrap_or_else(default_fs_root);
                Self::filesystem(root)
            }
            Some("memory") | Some("mem") => Self::memory(),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported ARTIFACT_BACKEND={other} (expected filesystem|memory)"
                )));
            }
        };

        Ok(Self { prefix, ..cfg })
    }
}

/// Where job artifacts are materialized.
#[derive(Clone)]
pub struct ArtifactStore {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    root: Option<PathBuf>,
    prefix: Option<String>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ArtifactStore {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn new(cfg: StorageConfig) -> Result<Self, StorageError> {
        let (kind, store, root) = match cfg.backend {
            StorageBackendConfig::Filesystem { root } => {
                ensure_dir(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as _, Some(root))
            }
            StorageBackendConfig::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as _, None)
            }
        };

        Ok(Self {
            kind,
            store,
            root,
            prefix: cfg.prefix.and_then(non_empty),
        })
    }

    /// Key directory holding one job's files.
    fn job_dir(&self, job_id: JobId) -> String {
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/jobs/{job_id}"),
            _ => format!("jobs/{job_id}"),
        }
    }

    fn to_path(&self, job_id: JobId, name: &str) -> Result<Path, StorageError> {
        let normalized = FileUnit::new(name, "")
            .normalized_name()
            .ok_or_else(|| StorageError::UnsafeName(name.to_string()))?;
        Ok(Path::from(format!("{}/{}", self.job_dir(job_id), normalized)))
    }

    /// Opaque locator of a job's artifacts: a directory path on disk, or a
    /// `memory://` URI.
    pub fn locate(&self, job_id: JobId) -> String {
        match &self.root {
            Some(root) => root.join(self.job_dir(job_id)).display().to_string(),
            None => format!("memory://{}", self.job_dir(job_id)),
        }
    }

    /// Write every file under the job's directory and return its locator.
    /// On failure nothing written for the job is left behind.
    pub async fn write_bundle(
        &self,
        job_id: JobId,
        files: &[FileUnit],
    ) -> Result<String, StorageError> {
        if let Err(e) = self.put_files(job_id, files).await {
            if let Err(cleanup) = self.remove_job(job_id).await {
                tracing::warn!("Failed to clean up partial bundle of job {}: {}", job_id, cleanup);
            }
            return Err(e);
        }
        Ok(self.locate(job_id))
    }

    async fn put_files(&self, job_id: JobId, files: &[FileUnit]) -> Result<(), StorageError> {
        for unit in files {
            let path = self.to_path(job_id, &unit.name)?;
            self.store
                .put(
                    &path,
                    object_store::PutPayload::from(Bytes::from(unit.content.clone())),
                )
                .await?;
            tracing::debug!("Wrote artifact {}", path);
        }
        Ok(())
    }

    pub async fn read_file(&self, job_id: JobId, name: &str) -> Result<String, StorageError> {
        let path = self.to_path(job_id, name)?;
        let bytes = match self.store.get(&path).await {
            Ok(res) => res.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        String::from_utf8(bytes.to_vec()).map_err(|_| StorageError::NotText(name.to_string()))
    }

    /// Read the named files, keyed by name.
    pub async fn read_bundle(
        &self,
        job_id: JobId,
        names: &[String],
    ) -> Result<BTreeMap<String, String>, StorageError> {
        let mut files = BTreeMap::new();
        for name in names {
            files.insert(name.clone(), self.read_file(job_id, name).await?);
        }
        Ok(files)
    }

    /// Delete everything stored for a job. Returns the number of files removed.
    pub async fn remove_job(&self, job_id: JobId) -> Result<usize, StorageError> {
        let dir = Path::from(self.job_dir(job_id));
        let objects: Vec<_> = self.store.list(Some(&dir)).try_collect().await?;
        for meta in &objects {
            self.store.delete(&meta.location).await?;
        }

        if let Some(root) = &self.root {
            match tokio::fs::remove_dir_all(root.join(self.job_dir(job_id))).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("Removed {} artifact(s) for job {}", objects.len(), job_id);
        Ok(objects.len())
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn bundle() -> Vec<FileUnit> {
        vec![
            FileUnit::new("main.py", "print('hi')\n"),
            FileUnit::new("./pkg/util.py", "X = 1\n"),
        ]
    }

    #[tokio::test]
    async fn in_memory_write_and_read() -> Result<(), StorageError> {
        let store = ArtifactStore::new(StorageConfig::memory())?;
        let job_id = JobId::new();

        let location = store.write_bundle(job_id, &bundle()).await?;
        assert_eq!(location, format!("memory://jobs/{job_id}"));
        assert_eq!(store.read_file(job_id, "pkg/util.py").await?, "X = 1\n");
        Ok(())
    }

    #[tokio::test]
    async fn filesystem_layout_and_removal() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(StorageConfig::filesystem(dir.path()).with_prefix("out/"))?;
        let job_id = JobId::new();

        let location = store.write_bundle(job_id, &bundle()).await?;
        let job_dir = dir.path().join(format!("out/jobs/{job_id}"));
        assert_eq!(location, job_dir.display().to_string());
        assert_eq!(
            std::fs::read_to_string(job_dir.join("pkg/util.py"))?,
            "X = 1\n"
        );

        let names = vec!["main.py".to_string(), "pkg/util.py".to_string()];
        let files = store.read_bundle(job_id, &names).await?;
        assert_eq!(files["main.py"], "print('hi')\n");

        assert_eq!(store.remove_job(job_id).await?, 2);
        assert!(!job_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn remove_unknown_job_is_a_no_op() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(StorageConfig::filesystem(dir.path()))?;
        assert_eq!(store.remove_job(JobId::new()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_not_found() -> Result<(), StorageError> {
        let store = ArtifactStore::new(StorageConfig::memory())?;
        let err = store.read_file(JobId::new(), "nope.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn unsafe_names_are_rejected() -> Result<(), StorageError> {
        let store = ArtifactStore::new(StorageConfig::memory())?;
        let files = vec![FileUnit::new("../escape.sh", "rm -rf /")];
        let err = store.write_bundle(JobId::new(), &files).await.unwrap_err();
        assert!(matches!(err, StorageError::UnsafeName(_)));
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(StorageConfig::filesystem(dir.path()))?;
        let job_id = JobId::new();
        let files = vec![
            FileUnit::new("main.py", "print('hi')\n"),
            FileUnit::new("../escape.sh", "rm -rf /"),
        ];

        let err = store.write_bundle(job_id, &files).await.unwrap_err();
        assert!(matches!(err, StorageError::UnsafeName(_)));
        assert!(matches!(
            store.read_file(job_id, "main.py").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!dir.path().join(format!("jobs/{job_id}")).exists());
        Ok(())
    }
}
