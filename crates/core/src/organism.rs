//! Organism model - a versioned unit of genetic code with lineage.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use crate::id::{JobId, OrganismId};
use crate::signals::SignalSnapshot;
use crate::Time;

/// Version assigned to freshly registered organisms.
pub const INITIAL_VERSION: &str = "1.0.0";

/// An organism tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    /// Unique identifier
    pub id: OrganismId,

    /// Display name
    pub name: String,

    /// Genetic code text
    pub genetic_code: String,

    /// Semantic version
    pub version: String,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,

    /// Who registered it
    pub author: String,

    /// Last measured consciousness level
    pub consciousness_level: f64,

    /// Last evaluated fitness (0..=1)
    pub fitness: f64,

    /// Depth in the lineage forest (0 = root)
    pub generation: u32,

    /// Ancestor ids, root first
    pub lineage: Vec<OrganismId>,

    /// Free-form tags
    pub tags: Vec<String>,

    /// Compiled circuit artifact
    pub circuit_qasm: Option<String>,

    /// Additional metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Organism {
    /// Immediate parent, if any.
    pub fn parent(&self) -> Option<&OrganismId> {
        self.lineage.last()
    }

    /// Whether this organism is a lineage root.
    pub fn is_root(&self) -> bool {
        self.lineage.is_empty()
    }

    /// Content hash over genetic code, version and generation (hex SHA-256).
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}_{}", self.genetic_code, self.version, self.generation));
        format!("{:x}", hasher.finalize())
    }
}

/// A recorded observation that a job's primary signal crossed the evolution
/// threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    /// Organism the job ran for
    pub organism_id: OrganismId,

    /// Job that produced the signals
    pub job_id: JobId,

    /// Sequence number of this record in the log
    pub generation: u64,

    /// Signals at the time of the event
    pub signals: SignalSnapshot,

    /// Backend that ran the job
    pub backend: String,

    /// When the record was taken
    pub timestamp: Time,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organism(code: &str) -> Organism {
        let now = chrono::Utc::now();
        Organism {
            id: OrganismId::new(),
            name: "alpha".to_string(),
            genetic_code: code.to_string(),
            version: INITIAL_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            author: "system".to_string(),
            consciousness_level: 0.0,
            fitness: 0.0,
            generation: 0,
            lineage: vec![],
            tags: vec![],
            circuit_qasm: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_content_hash_is_stable_and_sensitive() {
        let a = organism("ORGANISM Alpha {}");
        let mut b = a.clone();
        b.id = OrganismId::new();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);

        b.generation = 1;
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_parent_is_last_lineage_entry() {
        let mut o = organism("x");
        assert!(o.is_root());
        o.lineage = vec![OrganismId::from("a"), OrganismId::from("b")];
        assert_eq!(o.parent(), Some(&OrganismId::from("b")));
    }
}
