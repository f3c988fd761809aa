//! Scheduler configuration.

use helix_evolution::{DEFAULT_EVOLUTION_THRESHOLD, DEFAULT_HISTORY_LIMIT};
use helix_storage::DEFAULT_RETENTION_SECS;
use serde::{Deserialize, Serialize};

/// Default seconds between job store purges.
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 300;

/// Configuration for the job scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Primary signal must be strictly above this to record an evolution event
    pub evolution_threshold: f64,
    /// Evolution records kept per organism
    pub evolution_history_limit: usize,
    /// Retention of finished jobs in the job store
    pub job_ttl_secs: i64,
    /// Minimum seconds between expired-job purges run by the scheduler
    pub purge_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            evolution_threshold: DEFAULT_EVOLUTION_THRESHOLD,
            evolution_history_limit: DEFAULT_HISTORY_LIMIT,
            job_ttl_secs: DEFAULT_RETENTION_SECS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    /// Set the evolution threshold.
    pub fn with_evolution_threshold(mut self, threshold: f64) -> Self {
        self.evolution_threshold = threshold;
        self
    }

    /// Set the per-organism evolution history limit.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.evolution_history_limit = limit;
        self
    }

    /// Set the job retention in seconds.
    pub fn with_job_ttl_secs(mut self, secs: i64) -> Self {
        self.job_ttl_secs = secs;
        self
    }

    /// Set the purge interval in seconds.
    pub fn with_purge_interval_secs(mut self, secs: u64) -> Self {
        self.purge_interval_secs = secs;
        self
    }

    /// Purge interval as a duration.
    pub fn purge_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.purge_interval_secs)
    }

    /// Job retention as a duration.
    pub fn job_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_ttl_secs)
    }
}
