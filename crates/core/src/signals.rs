//! Circuit payloads and the measurement signals produced by executing them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::Time;

/// A serialized circuit specification.
///
/// The scheduler treats this as an opaque blob; only the execution backend
/// interprets `qasm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSpec {
    /// OpenQASM source
    pub qasm: String,
    /// Number of qubits
    pub n_qubits: u32,
    /// Circuit depth
    pub depth: u32,
    /// Gate count
    pub n_gates: u32,
}

impl CircuitSpec {
    /// Build a spec from QASM text, deriving the counts from the source.
    ///
    /// Qubit count is taken from `qreg name[N];` declarations, gate count is
    /// the number of statements that are not declarations, headers or
    /// measurements, and depth is approximated by the gate count.
    pub fn from_qasm(qasm: impl Into<String>) -> Self {
        let qasm = qasm.into();
        let mut n_qubits = 0u32;
        let mut n_gates = 0u32;

        for stmt in qasm.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let keyword = stmt.split_whitespace().next().unwrap_or_default();
            match keyword {
                "OPENQASM" | "include" | "creg" | "barrier" | "measure" => {}
                "qreg" => {
                    if let Some(size) = stmt
                        .split('[')
                        .nth(1)
                        .and_then(|rest| rest.split(']').next())
                        .and_then(|n| n.trim().parse::<u32>().ok())
                    {
                        n_qubits += size;
                    }
                }
                _ => n_gates += 1,
            }
        }

        Self {
            qasm,
            n_qubits,
            depth: n_gates,
            n_gates,
        }
    }
}

/// Raw signals returned by an execution backend for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignals {
    /// Measurement histogram (bitstring -> count)
    pub counts: BTreeMap<String, u64>,
    /// Normalized histogram
    pub probabilities: BTreeMap<String, f64>,
    /// Shannon entropy of the histogram (bits)
    pub entropy: f64,
    /// Coherence metric
    pub lambda: f64,
    /// Integrated-information metric; the primary signal
    pub phi: f64,
    /// Decoherence proxy
    pub gamma: f64,
    /// `lambda / gamma`
    pub coherence_index: f64,
    /// Depth of the submitted circuit
    pub original_depth: u32,
    /// Depth after backend compilation
    pub transpiled_depth: u32,
    /// Qubit count
    pub n_qubits: u32,
    /// Backend that produced the signals
    pub backend: String,
    /// When the signals were produced
    pub timestamp: Time,
}

impl RawSignals {
    /// The primary scalar signal used for evolution decisions.
    pub fn primary(&self) -> f64 {
        self.phi
    }

    /// Compact view of the scalar signals.
    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            phi: self.phi,
            lambda: self.lambda,
            gamma: self.gamma,
            coherence_index: self.coherence_index,
        }
    }
}

/// Scalar signals retained in evolution records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    /// Primary signal
    pub phi: f64,
    /// Coherence metric
    pub lambda: f64,
    /// Decoherence proxy
    pub gamma: f64,
    /// `lambda / gamma`
    pub coherence_index: f64,
}

/// Cost estimate for running a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Estimated backend runtime
    pub runtime_seconds: f64,
    /// Estimated cost in USD
    pub estimated_cost_usd: f64,
    /// Circuit depth the estimate was based on
    pub circuit_depth: u32,
    /// Gate count the estimate was based on
    pub n_gates: u32,
    /// Shots requested
    pub shots: u32,
    /// Backend name
    pub backend: String,
}

/// Backend health as reported by the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    /// Backend name
    pub name: String,
    /// Whether the backend accepts work
    pub operational: bool,
    /// Jobs waiting on the backend side
    pub pending_jobs: u32,
    /// Free-form status message
    pub status_msg: String,
    /// Qubits available
    pub n_qubits: u32,
    /// When the status was sampled
    pub timestamp: Time,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_from_qasm_counts() {
        let qasm = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[3];\ncreg c[3];\n\
                    h q[0];\ncx q[0],q[1];\nry(0.5) q[2];\nmeasure q -> c;";
        let spec = CircuitSpec::from_qasm(qasm);
        assert_eq!(spec.n_qubits, 3);
        assert_eq!(spec.n_gates, 3);
        assert_eq!(spec.depth, 3);
    }

    #[test]
    fn test_circuit_from_empty_qasm() {
        let spec = CircuitSpec::from_qasm("");
        assert_eq!(spec.n_qubits, 0);
        assert_eq!(spec.n_gates, 0);
    }
}
