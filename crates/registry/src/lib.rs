//! Helix Registry - organism lineage, species and mutation.
//!
//! Organisms are registered once and never change their genetic code; new
//! variants are derived with [`OrganismRegistry::evolve`], which applies a
//! [`MutationSpec`] and records the parent in the child's lineage.

#![warn(missing_docs)]

pub mod error;
pub mod genome;
pub mod mutation;
pub mod registry;
pub mod snapshot;

pub use error::{RegistryError, Result};
pub use genome::{species_key, Genome, Token};
pub use mutation::{Mutation, MutationSpec, DEFAULT_SHIFT_FACTOR};
pub use registry::{
    NewOrganism, OrganismPatch, OrganismRegistry, RankMetric, RegistryStatistics, SearchFilter,
};
pub use snapshot::{OrganismSnapshot, SNAPSHOT_FORMAT_VERSION};
