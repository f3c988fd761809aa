//! Portable organism snapshots.

use helix_core::{Organism, Time};
use serde::{Deserialize, Serialize};
use crate::{RegistryError, Result};

/// Snapshot format written by this crate.
pub const SNAPSHOT_FORMAT_VERSION: &str = "1.0";

/// An exported organism together with its ancestors, root first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganismSnapshot {
    /// The exported organism
    pub organism: Organism,
    /// Ancestors, root first
    pub lineage: Vec<Organism>,
    /// Content hash of `organism`
    pub hash: String,
    /// Export time
    pub export_timestamp: Time,
    /// Snapshot format version
    pub format_version: String,
}

impl OrganismSnapshot {
    /// Check format version and content hash.
    pub fn verify(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(RegistryError::Snapshot(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        let actual = self.organism.content_hash();
        if actual != self.hash {
            return Err(RegistryError::Snapshot(format!(
                "content hash mismatch for {}: expected {}, got {}",
                self.organism.id, self.hash, actual
            )));
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RegistryError::Snapshot(e.to_string()))
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RegistryError::Snapshot(e.to_string()))
    }
}
