//! Helix Evolution - fitness scoring and evolution eligibility.

#![warn(missing_docs, unused_crate_dependencies)]

mod fitness;
mod history;
mod trigger;

pub use fitness::{
    EvaluatorConfig, FitnessComponents, FitnessEvaluator, FitnessReport, FitnessWeights,
    Recommendation, WeightedFitnessEvaluator, MAX_PHI,
};
pub use history::{EvaluationHistory, Prediction, TrajectoryPoint};
pub use trigger::{
    EvolutionLog, EvolutionTrigger, DEFAULT_EVOLUTION_THRESHOLD, DEFAULT_HISTORY_LIMIT,
};
