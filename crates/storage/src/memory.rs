//! In-memory job store with expiry.

use std::collections::HashMap;
use helix_core::{Job, JobId, Time};
use tokio::sync::RwLock;
use tracing::debug;
use super::{JobStore, Result, DEFAULT_RETENTION_SECS};

struct Entry {
    job: Job,
    expires_at: Time,
}

/// Job store kept in process memory.
pub struct MemoryJobStore {
    entries: RwLock<HashMap<JobId, Entry>>,
    retention: chrono::Duration,
}

impl MemoryJobStore {
    /// Create a store with the default 24 hour retention.
    pub fn new() -> Self {
        Self::with_retention(chrono::Duration::seconds(DEFAULT_RETENTION_SECS))
    }

    /// Create a store with a custom retention window.
    pub fn with_retention(retention: chrono::Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, job: &Job) -> Result<()> {
        let entry = Entry {
            job: job.clone(),
            expires_at: chrono::Utc::now() + self.retention,
        };
        self.entries.write().await.insert(job.id.clone(), entry);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let now = chrono::Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.job.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict on read.
        let mut entries = self.entries.write().await;
        if entries.get(id).is_some_and(|e| e.expires_at <= now) {
            entries.remove(id);
            debug!("Evicted expired job {}", id);
        }
        Ok(None)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok(before - entries.len())
    }
}
