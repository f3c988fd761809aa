//! Unique identifiers for Helix entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a Job
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new JobId
    pub fn new() -> Self {
        Self(format!("job_{}", Ulid::new()))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an Organism.
///
/// Kept as an open string so callers may submit jobs for organisms that live
/// outside the local registry; generated ids carry an `org_` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganismId(pub String);

impl OrganismId {
    /// Generate a new OrganismId
    pub fn new() -> Self {
        Self(format!("org_{}", Ulid::new()))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for OrganismId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrganismId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrganismId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrganismId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
