//! Fitness evaluation - turns raw execution signals into a scored report.

use std::fmt;
use helix_core::{OrganismId, RawSignals, SignalSnapshot, Time};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Upper bound of the primary signal.
pub const MAX_PHI: f64 = 0.987;

/// Entropy (bits) at which the information score peaks.
const OPTIMAL_ENTROPY: f64 = 2.0;
const ENTROPY_WIDTH: f64 = 1.5;

/// Variance of a maximally skewed two-outcome distribution.
const MAX_VARIANCE: f64 = 0.25;

/// Transpiled depth per qubit at which the complexity score peaks.
const OPTIMAL_DEPTH_RATIO: f64 = 10.0;

/// Weight sums this close to 1 are left as configured.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Weights of the fitness components. They sum to 1 by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    /// Weight of the consciousness score
    pub consciousness: f64,
    /// Weight of the coherence score
    pub coherence: f64,
    /// Weight of the information score
    pub information: f64,
    /// Weight of the stability score
    pub stability: f64,
    /// Weight of the complexity score
    pub complexity: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            consciousness: 0.30,
            coherence: 0.25,
            information: 0.20,
            stability: 0.15,
            complexity: 0.10,
        }
    }
}

impl FitnessWeights {
    fn values(&self) -> [f64; 5] {
        [
            self.consciousness,
            self.coherence,
            self.information,
            self.stability,
            self.complexity,
        ]
    }

    /// Sum of the weights.
    pub fn total(&self) -> f64 {
        self.values().iter().sum()
    }

    /// Scale the weights to sum to 1.
    ///
    /// Negative or non-finite weights count as 0. When nothing positive is
    /// left the defaults are returned.
    pub fn normalized(&self) -> Self {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let cleaned = Self {
            consciousness: clean(self.consciousness),
            coherence: clean(self.coherence),
            information: clean(self.information),
            stability: clean(self.stability),
            complexity: clean(self.complexity),
        };
        let total = cleaned.total();
        if total <= 0.0 || !total.is_finite() {
            return Self::default();
        }
        if cleaned == *self && (total - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            return cleaned;
        }
        Self {
            consciousness: cleaned.consciousness / total,
            coherence: cleaned.coherence / total,
            information: cleaned.information / total,
            stability: cleaned.stability / total,
            complexity: cleaned.complexity / total,
        }
    }
}

/// Evaluator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Component weights
    pub weights: FitnessWeights,
    /// Generation budget used by the evolution potential
    pub max_generations: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            weights: FitnessWeights::default(),
            max_generations: 100,
        }
    }
}

impl EvaluatorConfig {
    /// Set the component weights.
    pub fn with_weights(mut self, weights: FitnessWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the generation budget.
    pub fn with_max_generations(mut self, max_generations: u32) -> Self {
        self.max_generations = max_generations;
        self
    }
}

/// Per-component scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessComponents {
    /// Sigmoid of the normalized primary signal
    pub consciousness: f64,
    /// Lambda over gamma, scaled
    pub coherence: f64,
    /// Closeness of the entropy to its optimum
    pub information: f64,
    /// Flatness of the outcome distribution
    pub stability: f64,
    /// Closeness of depth per qubit to its optimum
    pub complexity: f64,
}

impl FitnessComponents {
    fn values(&self) -> [f64; 5] {
        [
            self.consciousness,
            self.coherence,
            self.information,
            self.stability,
            self.complexity,
        ]
    }

    /// Weighted sum of the components.
    pub fn weighted(&self, weights: &FitnessWeights) -> f64 {
        self.consciousness * weights.consciousness
            + self.coherence * weights.coherence
            + self.information * weights.information
            + self.stability * weights.stability
            + self.complexity * weights.complexity
    }
}

/// What to do next with an evaluated organism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// High fitness, little left to gain
    Preserve,
    /// High fitness, still room to improve
    Refine,
    /// Moderate fitness, high potential
    Evolve,
    /// Moderate fitness, low potential
    Optimize,
    /// Low fitness, high potential
    Transform,
    /// Low fitness, low potential
    Redesign,
}

impl Recommendation {
    /// Pick a bucket from fitness and evolution potential.
    pub fn classify(fitness: f64, potential: f64) -> Self {
        if fitness >= 0.8 {
            if potential < 0.2 {
                Self::Preserve
            } else {
                Self::Refine
            }
        } else if fitness >= 0.5 {
            if potential >= 0.5 {
                Self::Evolve
            } else {
                Self::Optimize
            }
        } else if potential >= 0.7 {
            Self::Transform
        } else {
            Self::Redesign
        }
    }

    /// Human-readable advice.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Preserve => {
                "High fitness with low evolution potential. Maintain current configuration."
            }
            Self::Refine => {
                "High fitness but evolution potential remains. Consider targeted improvements."
            }
            Self::Evolve => "Moderate fitness with high potential. Continue evolution process.",
            Self::Optimize => "Moderate fitness. Focus on specific component improvements.",
            Self::Transform => "Low fitness but high potential. Major evolution recommended.",
            Self::Redesign => "Low fitness and potential. Consider organism redesign.",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Preserve => "PRESERVE",
            Self::Refine => "REFINE",
            Self::Evolve => "EVOLVE",
            Self::Optimize => "OPTIMIZE",
            Self::Transform => "TRANSFORM",
            Self::Redesign => "REDESIGN",
        };
        write!(f, "{}", label)
    }
}

/// Result of one fitness evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessReport {
    /// Evaluated organism
    pub organism_id: OrganismId,
    /// Organism generation at evaluation time
    pub generation: u32,
    /// When the evaluation happened
    pub timestamp: Time,
    /// Weighted fitness in `[0, 1]`
    pub total_fitness: f64,
    /// Component scores
    pub components: FitnessComponents,
    /// Room for beneficial evolution in `[0, 1]`
    pub evolution_potential: f64,
    /// Scalar signals the report was computed from
    pub signals: SignalSnapshot,
    /// Entropy the report was computed from
    pub entropy: f64,
    /// Suggested next step
    pub recommendation: Recommendation,
}

/// Scores execution signals.
pub trait FitnessEvaluator: Send + Sync {
    /// Evaluate one run of `organism_id` at `generation`.
    fn evaluate(
        &self,
        organism_id: &OrganismId,
        signals: &RawSignals,
        generation: u32,
    ) -> FitnessReport;
}

/// Reference evaluator: a weighted sum of five component scores.
#[derive(Debug, Clone, Default)]
pub struct WeightedFitnessEvaluator {
    config: EvaluatorConfig,
}

impl WeightedFitnessEvaluator {
    /// Create an evaluator. Weights are normalized to sum to 1 so the total
    /// fitness stays in `[0, 1]`.
    pub fn new(mut config: EvaluatorConfig) -> Self {
        let weights = config.weights.normalized();
        if weights != config.weights {
            warn!(
                "Normalized fitness weights (sum {:.4} -> {:.4})",
                config.weights.total(),
                weights.total()
            );
            config.weights = weights;
        }
        Self { config }
    }

    /// Evaluator configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Score each component.
    pub fn components(&self, signals: &RawSignals) -> FitnessComponents {
        FitnessComponents {
            consciousness: consciousness_score(signals.phi),
            coherence: coherence_score(signals.lambda, signals.gamma),
            information: information_score(signals.entropy),
            stability: stability_score(signals),
            complexity: complexity_score(signals.transpiled_depth, signals.n_qubits),
        }
    }

    /// Evolution potential: component imbalance, remaining generation budget
    /// and missing consciousness, capped at 1.
    pub fn evolution_potential(&self, components: &FitnessComponents, generation: u32) -> f64 {
        let imbalance = (std_dev(&components.values()) * 2.0).min(1.0);
        let budget = if self.config.max_generations == 0 {
            0.0
        } else {
            1.0 - generation as f64 / self.config.max_generations as f64
        };
        let headroom = 1.0 - components.consciousness;
        (imbalance * 0.4 + budget * 0.3 + headroom * 0.3).min(1.0)
    }
}

impl FitnessEvaluator for WeightedFitnessEvaluator {
    fn evaluate(
        &self,
        organism_id: &OrganismId,
        signals: &RawSignals,
        generation: u32,
    ) -> FitnessReport {
        let components = self.components(signals);
        let total_fitness = components.weighted(&self.config.weights);
        let evolution_potential = self.evolution_potential(&components, generation);

        FitnessReport {
            organism_id: organism_id.clone(),
            generation,
            timestamp: chrono::Utc::now(),
            total_fitness,
            components,
            evolution_potential,
            signals: signals.snapshot(),
            entropy: signals.entropy,
            recommendation: Recommendation::classify(total_fitness, evolution_potential),
        }
    }
}

fn consciousness_score(phi: f64) -> f64 {
    let normalized = (phi / MAX_PHI).min(1.0);
    1.0 / (1.0 + (-10.0 * (normalized - 0.5)).exp())
}

fn coherence_score(lambda: f64, gamma: f64) -> f64 {
    if gamma == 0.0 {
        return 1.0;
    }
    (lambda / (gamma + 1e-10) / 10.0).min(1.0)
}

fn information_score(entropy: f64) -> f64 {
    if entropy <= 0.0 {
        return 0.0;
    }
    (-(entropy - OPTIMAL_ENTROPY).powi(2) / (2.0 * ENTROPY_WIDTH.powi(2))).exp()
}

fn stability_score(signals: &RawSignals) -> f64 {
    if signals.counts.is_empty() || signals.probabilities.is_empty() {
        return 0.0;
    }
    let probs: Vec<f64> = signals.probabilities.values().copied().collect();
    1.0 - (variance(&probs) / MAX_VARIANCE).min(1.0)
}

fn complexity_score(transpiled_depth: u32, n_qubits: u32) -> f64 {
    if transpiled_depth == 0 || n_qubits == 0 {
        return 0.0;
    }
    let ratio = transpiled_depth as f64 / n_qubits as f64;
    if ratio <= OPTIMAL_DEPTH_RATIO {
        ratio / OPTIMAL_DEPTH_RATIO
    } else {
        OPTIMAL_DEPTH_RATIO / ratio
    }
}

/// Population variance.
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn signals(phi: f64, counts: &[(&str, u64)]) -> RawSignals {
        let counts: BTreeMap<String, u64> =
            counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let total: u64 = counts.values().sum();
        let probabilities = counts
            .iter()
            .map(|(k, v)| (k.clone(), *v as f64 / total as f64))
            .collect();
        RawSignals {
            counts,
            probabilities,
            entropy: 2.0,
            lambda: 1.0,
            phi,
            gamma: 0.2,
            coherence_index: 5.0,
            original_depth: 20,
            transpiled_depth: 20,
            n_qubits: 2,
            backend: "test".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_component_scores() {
        let evaluator = WeightedFitnessEvaluator::default();
        let s = signals(MAX_PHI / 2.0, &[("00", 50), ("11", 50)]);
        let c = evaluator.components(&s);

        assert!((c.consciousness - 0.5).abs() < 1e-12);
        assert!((c.coherence - 0.5).abs() < 1e-6);
        assert!((c.information - 1.0).abs() < 1e-12);
        assert!((c.stability - 1.0).abs() < 1e-12);
        assert!((c.complexity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_edge_components() {
        assert_eq!(coherence_score(3.0, 0.0), 1.0);
        assert_eq!(information_score(0.0), 0.0);
        assert_eq!(complexity_score(0, 4), 0.0);
        assert_eq!(complexity_score(40, 2), 0.5);
        assert_eq!(complexity_score(5, 1), 0.5);

        let mut empty = signals(0.1, &[("0", 1)]);
        empty.counts.clear();
        assert_eq!(stability_score(&empty), 0.0);
    }

    #[test]
    fn test_total_fitness_is_weighted_sum() {
        let evaluator = WeightedFitnessEvaluator::default();
        let s = signals(0.8, &[("00", 70), ("01", 10), ("10", 10), ("11", 10)]);
        let report = evaluator.evaluate(&OrganismId::from("org_a"), &s, 3);

        let c = report.components;
        let expected = 0.3 * c.consciousness
            + 0.25 * c.coherence
            + 0.2 * c.information
            + 0.15 * c.stability
            + 0.1 * c.complexity;
        assert!((report.total_fitness - expected).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&report.total_fitness));
        assert!((0.0..=1.0).contains(&report.evolution_potential));
        assert_eq!(report.generation, 3);
    }

    #[test]
    fn test_potential_decreases_with_generation() {
        let evaluator =
            WeightedFitnessEvaluator::new(EvaluatorConfig::default().with_max_generations(10));
        let c = evaluator.components(&signals(0.5, &[("0", 3), ("1", 1)]));
        assert!(evaluator.evolution_potential(&c, 0) > evaluator.evolution_potential(&c, 9));
    }

    #[test]
    fn test_recommendation_buckets() {
        assert_eq!(Recommendation::classify(0.9, 0.1), Recommendation::Preserve);
        assert_eq!(Recommendation::classify(0.8, 0.2), Recommendation::Refine);
        assert_eq!(Recommendation::classify(0.6, 0.5), Recommendation::Evolve);
        assert_eq!(Recommendation::classify(0.5, 0.49), Recommendation::Optimize);
        assert_eq!(Recommendation::classify(0.2, 0.7), Recommendation::Transform);
        assert_eq!(Recommendation::classify(0.2, 0.69), Recommendation::Redesign);
        assert_eq!(Recommendation::Evolve.to_string(), "EVOLVE");
    }

    #[test]
    fn test_config_partial_json() {
        let config: EvaluatorConfig = serde_json::from_str(r#"{"max_generations": 7}"#).unwrap();
        assert_eq!(config.max_generations, 7);
        assert_eq!(config.weights, FitnessWeights::default());
    }

    #[test]
    fn test_custom_weights_are_normalized() {
        let weights = FitnessWeights {
            consciousness: 1.0,
            coherence: 1.0,
            information: 1.0,
            stability: 1.0,
            complexity: -2.0,
        };
        let evaluator =
            WeightedFitnessEvaluator::new(EvaluatorConfig::default().with_weights(weights));
        let applied = evaluator.config().weights;
        assert!((applied.total() - 1.0).abs() < 1e-12);
        assert_eq!(applied.complexity, 0.0);
        assert!((applied.consciousness - 0.25).abs() < 1e-12);

        let s = signals(MAX_PHI, &[("00", 50), ("11", 50)]);
        let report = evaluator.evaluate(&OrganismId::from("org_w"), &s, 0);
        assert!((0.0..=1.0).contains(&report.total_fitness));

        let zero = FitnessWeights {
            consciousness: 0.0,
            coherence: 0.0,
            information: 0.0,
            stability: 0.0,
            complexity: f64::NAN,
        };
        assert_eq!(zero.normalized(), FitnessWeights::default());
        assert_eq!(FitnessWeights::default().normalized(), FitnessWeights::default());
        assert_eq!(WeightedFitnessEvaluator::default().config().weights, FitnessWeights::default());
    }
}
