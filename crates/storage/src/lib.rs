//! Job persistence for Helix.
//!
//! This crate provides a trait-based job store with bounded retention and two
//! implementations: in-memory and JSON files on disk.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod json_storage;

pub use trait_::{JobStore, StorageError, Result, DEFAULT_RETENTION_SECS};
pub use memory::MemoryJobStore;
pub use json_storage::JsonJobStore;
