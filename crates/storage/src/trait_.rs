//! Job store trait abstraction.

use async_trait::async_trait;
use helix_core::{Job, JobId};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Default retention window for persisted jobs (24 hours).
pub const DEFAULT_RETENTION_SECS: i64 = 86_400;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Persistence for job snapshots with bounded retention.
///
/// Writes are best-effort from the scheduler's point of view: callers log a
/// failed `put` and carry on. Entries older than the retention window read as
/// absent and may be evicted. There is no recovery contract: a job persisted
/// as `running` is not resumed after a restart.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Save a job snapshot (create or overwrite), refreshing its retention.
    async fn put(&self, job: &Job) -> Result<()>;

    /// Load a job snapshot by ID.
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;

    /// Evict expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}
