//! Execution backends.
//!
//! The scheduler talks to a backend through [`ExecutionBackend`], a blocking
//! interface run on tokio's blocking pool.

use std::collections::BTreeMap;
use helix_core::{BackendHealth, CircuitSpec, CostEstimate, RawSignals};
use sha2::{Digest, Sha256};
use crate::signals;

/// Seconds of backend time per gate layer per shot.
const SECONDS_PER_LAYER_SHOT: f64 = 0.001;

/// Fixed per-job overhead in seconds.
const JOB_OVERHEAD_SECONDS: f64 = 10.0;

/// USD per runtime second.
const COST_PER_SECOND: f64 = 0.00135;

/// Cap on the qubits a simulated histogram spans.
const MAX_SIMULATED_QUBITS: u32 = 4;

/// Errors raised by an execution backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Backend cannot take work
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Execution failed
    #[error("execution failed: {0}")]
    Execution(String),
}

/// A device or simulator that executes circuits.
pub trait ExecutionBackend: Send + Sync {
    /// Backend name recorded on jobs.
    fn name(&self) -> &str;

    /// Execute `circuit` for `shots` shots. May block.
    fn execute(&self, circuit: &CircuitSpec, shots: u32) -> Result<RawSignals, BackendError>;

    /// Estimate runtime and cost.
    fn estimate_cost(&self, circuit: &CircuitSpec, shots: u32) -> CostEstimate {
        estimate(self.name(), circuit, shots)
    }

    /// Current health.
    fn health(&self) -> BackendHealth;
}

/// Runtime/cost model: `depth * shots * 0.001 + 10` seconds at $0.00135/s.
pub fn estimate(backend: &str, circuit: &CircuitSpec, shots: u32) -> CostEstimate {
    let runtime_seconds =
        circuit.depth as f64 * shots as f64 * SECONDS_PER_LAYER_SHOT + JOB_OVERHEAD_SECONDS;
    CostEstimate {
        runtime_seconds,
        estimated_cost_usd: runtime_seconds * COST_PER_SECOND,
        circuit_depth: circuit.depth,
        n_gates: circuit.n_gates,
        shots,
        backend: backend.to_string(),
    }
}

/// Deterministic in-process backend.
///
/// The measurement histogram is derived from a digest of the circuit text, so
/// the same circuit always yields the same signals and any edit to it changes
/// them.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    name: String,
    n_qubits: u32,
}

impl SimulatedBackend {
    /// Create a simulator named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            n_qubits: 127,
        }
    }

    fn histogram(&self, circuit: &CircuitSpec, shots: u32) -> BTreeMap<String, u64> {
        let width = circuit.n_qubits.clamp(1, MAX_SIMULATED_QUBITS) as usize;
        let outcomes = 1usize << width;
        let digest = Sha256::digest(circuit.qasm.as_bytes());

        // Squared digest bytes skew the distribution so it is rarely uniform.
        let weights: Vec<u64> = (0..outcomes)
            .map(|i| {
                let b = digest[i % digest.len()] as u64 + 1;
                b * b
            })
            .collect();
        let total_weight: u64 = weights.iter().sum();

        let mut counts = BTreeMap::new();
        let mut assigned = 0u64;
        for (i, w) in weights.iter().enumerate() {
            let c = shots as u64 * w / total_weight;
            assigned += c;
            if c > 0 {
                counts.insert(format!("{:0width$b}", i, width = width), c);
            }
        }
        let remainder = shots as u64 - assigned;
        if remainder > 0 {
            *counts.entry(format!("{:0width$b}", 0, width = width)).or_insert(0) += remainder;
        }
        counts
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new("simulator")
    }
}

impl ExecutionBackend for SimulatedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, circuit: &CircuitSpec, shots: u32) -> Result<RawSignals, BackendError> {
        if shots == 0 {
            return Err(BackendError::Execution("shots must be positive".into()));
        }
        if circuit.qasm.trim().is_empty() {
            return Err(BackendError::Execution("empty circuit".into()));
        }
        let counts = self.histogram(circuit, shots);
        Ok(signals::from_counts(counts, circuit, circuit.depth, &self.name))
    }

    fn health(&self) -> BackendHealth {
        BackendHealth {
            name: self.name.clone(),
            operational: true,
            pending_jobs: 0,
            status_msg: "active".into(),
            n_qubits: self.n_qubits,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = "OPENQASM 2.0; qreg q[2]; creg c[2]; h q[0]; cx q[0],q[1]; measure q -> c;";

    #[test]
    fn test_estimate_cost() {
        let circuit = CircuitSpec::from_qasm(BELL);
        let est = SimulatedBackend::default().estimate_cost(&circuit, 1000);
        assert!((est.runtime_seconds - 12.0).abs() < 1e-9);
        assert!((est.estimated_cost_usd - 12.0 * 0.00135).abs() < 1e-12);
        assert_eq!(est.shots, 1000);
        assert_eq!(est.backend, "simulator");
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let backend = SimulatedBackend::default();
        let circuit = CircuitSpec::from_qasm(BELL);
        let a = backend.execute(&circuit, 1024).unwrap();
        let b = backend.execute(&circuit, 1024).unwrap();
        assert_eq!(a.counts, b.counts);
        assert_eq!(a.phi, b.phi);
        assert_eq!(a.counts.values().sum::<u64>(), 1024);
        assert!(a.counts.keys().all(|k| k.len() == 2));
    }

    #[test]
    fn test_edits_change_signals() {
        let backend = SimulatedBackend::default();
        let a = backend.execute(&CircuitSpec::from_qasm(BELL), 4096).unwrap();
        let b = backend
            .execute(&CircuitSpec::from_qasm(BELL.replace("h q[0]", "x q[0]")), 4096)
            .unwrap();
        assert_ne!(a.counts, b.counts);
    }

    #[test]
    fn test_rejects_bad_input() {
        let backend = SimulatedBackend::default();
        assert!(backend.execute(&CircuitSpec::from_qasm(BELL), 0).is_err());
        assert!(backend.execute(&CircuitSpec::from_qasm(""), 10).is_err());
        assert!(backend.health().operational);
    }
}
