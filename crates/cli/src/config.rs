//! Configuration file loading.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use helix_evolution::EvaluatorConfig;
use helix_execution::SchedulerConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration. Every field is optional in the JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelixConfig {
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
    /// Fitness evaluator settings
    pub evaluator: EvaluatorConfig,
    /// Directory for the JSON job store; jobs stay in memory when unset
    pub store_dir: Option<PathBuf>,
}

impl HelixConfig {
    /// Load from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing config {}", path.display()))
    }
}
