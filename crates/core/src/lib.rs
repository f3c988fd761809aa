//! Helix core data models.
//!
//! This crate defines the data structures shared by the scheduler, the job
//! store and the organism registry.

#![warn(missing_docs)]

// Core identities
mod id;

// Execution
mod job;
mod signals;

// Lineage
mod organism;

// Re-exports
pub use id::{JobId, OrganismId};
pub use job::{Job, JobStatus, TransitionError};
pub use signals::{BackendHealth, CircuitSpec, CostEstimate, RawSignals, SignalSnapshot};
pub use organism::{EvolutionRecord, Organism, INITIAL_VERSION};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
