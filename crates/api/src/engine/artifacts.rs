//! On-disk lifetime of uploaded media.
//!
//! The store writes uploads into one directory and removes them once their
//! job is terminal. It never reads or writes job state. Deletion is
//! idempotent: a missing file counts as already deleted.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use echo_core::naming::artifact_file_name;
use echo_core::types::JobId;
use echo_dispatch::MediaLocator;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    public_base_url: Option<String>,
    delete_grace: Duration,
}

impl ArtifactStore {
    /// Create the upload directory if needed and open a store over it.
    pub async fn open(
        root: impl AsRef<Path>,
        public_base_url: Option<String>,
        delete_grace: Duration,
    ) -> io::Result<Self> {
        tokio::fs::create_dir_all(root.as_ref()).await?;
        let root = tokio::fs::canonicalize(root.as_ref()).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
            delete_grace,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// How long a terminal job's artifact is kept before deletion.
    pub fn delete_grace(&self) -> Duration {
        self.delete_grace
    }

    /// Write an upload as `{job_id}{.ext}` and return its absolute path.
    pub async fn save(
        &self,
        job_id: JobId,
        original_name: Option<&str>,
        data: &[u8],
    ) -> io::Result<PathBuf> {
        let path = self.root.join(artifact_file_name(job_id, original_name));
        tokio::fs::write(&path, data).await?;
        tracing::debug!(job_id = %job_id, path = %path.display(), bytes = data.len(), "Artifact stored");
        Ok(path)
    }

    /// How the backend should reach a stored artifact.
    pub fn media_locator(&self, path: &str) -> MediaLocator {
        let file_name = Path::new(path).file_name().and_then(|n| n.to_str());
        match (&self.public_base_url, file_name) {
            (Some(base), Some(name)) => MediaLocator::FileUrl(format!("{base}/{name}")),
            _ => MediaLocator::FilePath(path.to_string()),
        }
    }

    /// Remove an artifact now. Returns `false` if it was already gone.
    ///
    /// Paths outside the upload directory are never touched.
    pub async fn delete(&self, path: &Path) -> io::Result<bool> {
        if !path.starts_with(&self.root) {
            tracing::warn!(path = %path.display(), "Refusing to delete file outside the upload directory");
            return Ok(false);
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
