//! JSON file job store.
//!
//! Stores each job as a pretty-printed JSON envelope under `<root>/jobs/`,
//! alongside the time it stops being retained. Expired files are deleted when
//! read or purged.

use std::path::{Path, PathBuf};
use helix_core::{Job, JobId, Time};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use super::{JobStore, Result, DEFAULT_RETENTION_SECS};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    expires_at: Time,
    job: Job,
}

/// File-based JSON job store.
pub struct JsonJobStore {
    root: PathBuf,
    retention: chrono::Duration,
}

impl JsonJobStore {
    /// Create storage with the default retention. This creates the `jobs/`
    /// directory under `root`.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_retention(root, chrono::Duration::seconds(DEFAULT_RETENTION_SECS)).await
    }

    /// Create storage with a custom retention window.
    pub async fn with_retention(
        root: impl AsRef<Path>,
        retention: chrono::Duration,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("jobs")).await?;
        Ok(Self { root, retention })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a job file; `None` for ids that are not plain file names.
    fn job_path(&self, id: &JobId) -> Option<PathBuf> {
        let raw = id.as_str();
        if raw.is_empty() || raw.contains(|c: char| c == '/' || c == '\\') || raw.contains("..") {
            return None;
        }
        Some(self.root.join("jobs").join(format!("{}.json", raw)))
    }
}

#[async_trait::async_trait]
impl JobStore for JsonJobStore {
    async fn put(&self, job: &Job) -> Result<()> {
        let path = self
            .job_path(&job.id)
            .ok_or_else(|| super::StorageError::Other(format!("invalid job id: {}", job.id)))?;
        let envelope = Envelope {
            expires_at: chrono::Utc::now() + self.retention,
            job: job.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        fs::write(&path, json.as_bytes()).await?;
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let Some(path) = self.job_path(id) else {
            return Ok(None);
        };
        let Some(envelope) = read_json::<Envelope>(&path).await? else {
            return Ok(None);
        };

        if envelope.expires_at <= chrono::Utc::now() {
            remove_if_exists(&path).await?;
            debug!("Evicted expired job {}", id);
            return Ok(None);
        }
        Ok(Some(envelope.job))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let mut removed = 0;
        let mut rd = fs::read_dir(self.root.join("jobs")).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            // Unreadable files are left for an operator to inspect.
            if let Ok(Some(envelope)) = read_json::<Envelope>(&path).await {
                if envelope.expires_at <= now {
                    remove_if_exists(&path).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}
