//! Execution layer - backends, signal processing and the job scheduler.

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod scheduler;
pub mod signals;

pub use backend::{BackendError, ExecutionBackend, SimulatedBackend};
pub use config::{SchedulerConfig, DEFAULT_PURGE_INTERVAL_SECS};
pub use scheduler::{
    callback_fn, CircuitOptimization, JobCallback, QueueSnapshot, QueuedJob, Scheduler,
    SchedulerError, SubmitRequest, DEFAULT_SHOTS, OPTIMIZATION_SHOTS,
};
