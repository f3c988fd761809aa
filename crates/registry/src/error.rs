//! Registry errors.

use helix_core::OrganismId;

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors raised by the organism registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Bad input to register/evolve/import
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown organism
    #[error("organism not found: {0}")]
    NotFound(OrganismId),

    /// Snapshot failed its integrity check or is malformed
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}
