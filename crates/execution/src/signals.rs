//! Signal processing - derive scalar signals from a measurement histogram.

use std::collections::BTreeMap;
use helix_core::{CircuitSpec, RawSignals};

/// Coherence constant applied to the dominant outcome probability.
pub const LAMBDA_PHI: f64 = 2.176435e-8;

/// Upper bound of phi.
const PHI_CAP: f64 = 0.987;

/// Cap on the decoherence proxy.
const GAMMA_CAP: f64 = 10.0;

/// Build [`RawSignals`] from a measurement histogram.
///
/// `transpiled_depth` is the depth the backend actually executed; backends
/// without a compilation step pass the circuit depth.
pub fn from_counts(
    counts: BTreeMap<String, u64>,
    circuit: &CircuitSpec,
    transpiled_depth: u32,
    backend: &str,
) -> RawSignals {
    let total: u64 = counts.values().sum();
    let probabilities: BTreeMap<String, f64> = if total == 0 {
        BTreeMap::new()
    } else {
        counts
            .iter()
            .map(|(k, &c)| (k.clone(), c as f64 / total as f64))
            .collect()
    };

    let probs: Vec<f64> = probabilities.values().copied().collect();
    let entropy = shannon_entropy(&probs);
    let lambda = lambda(&probs);
    let phi = phi(&probs, entropy);
    let gamma = gamma(&probs);

    RawSignals {
        counts,
        probabilities,
        entropy,
        lambda,
        phi,
        gamma,
        coherence_index: lambda / (gamma + 1e-10),
        original_depth: circuit.depth,
        transpiled_depth,
        n_qubits: circuit.n_qubits,
        backend: backend.to_string(),
        timestamp: chrono::Utc::now(),
    }
}

/// Shannon entropy in bits.
pub fn shannon_entropy(probs: &[f64]) -> f64 {
    -probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|p| p * p.log2())
        .sum::<f64>()
}

fn max_prob(probs: &[f64]) -> f64 {
    probs.iter().copied().fold(0.0, f64::max)
}

fn lambda(probs: &[f64]) -> f64 {
    max_prob(probs) * LAMBDA_PHI * 1e8
}

fn phi(probs: &[f64], entropy: f64) -> f64 {
    if probs.is_empty() || entropy == 0.0 {
        return 0.0;
    }
    let n = probs.len() as f64;
    let normalized_entropy = entropy / n.log2();
    let uniform = 1.0 / n;
    let coherence = (max_prob(probs) - uniform) / (1.0 - uniform);
    let entanglement = 1.0 - (0.5 - normalized_entropy).abs() * 2.0;

    let phi = coherence * 0.4 + entanglement * 0.3 + (1.0 - normalized_entropy) * 0.3;
    (phi * PHI_CAP).min(PHI_CAP)
}

fn gamma(probs: &[f64]) -> f64 {
    if probs.is_empty() {
        return 1.0;
    }
    let n = probs.len() as f64;
    let mean = probs.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 1.0;
    }
    let variance = probs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    (variance / (mean + 1e-10)).min(GAMMA_CAP)
}
