use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::sync::{JobConfigStore, SyncError, SyncJobsFile};

/// Reads sync jobs from a JSON file.
pub struct JobFileStore {
    path: PathBuf,
}

impl JobFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JobConfigStore for JobFileStore {
    async fn load(&self) -> Result<SyncJobsFile, SyncError> {
        if !self.path.exists() {
            return Err(SyncError::Config(format!(
                "job file {} does not exist",
                self.path.display()
            )));
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| SyncError::Config(format!("{}: {}", self.path.display(), e)))?;

        let file: SyncJobsFile = serde_json::from_str(&text)
            .map_err(|e| SyncError::Config(format!("{}: {}", self.path.display(), e)))?;
        file.validate()?;

        tracing::debug!(path = %self.path.display(), jobs = file.jobs.len(), "Loaded job file");
        Ok(file)
    }
}
