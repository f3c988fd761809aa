//! Evaluation history, fitness trajectories and success forecasts.

use helix_core::{OrganismId, Time};
use serde::{Deserialize, Serialize};
use crate::fitness::FitnessReport;

/// Number of most recent trajectory points used by [`EvaluationHistory::predict`].
const PREDICTION_WINDOW: usize = 5;

/// One point of an organism's fitness trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Generation
    pub generation: u32,
    /// Total fitness
    pub fitness: f64,
    /// Primary signal
    pub phi: f64,
    /// Coherence metric
    pub lambda: f64,
    /// Evolution potential
    pub evolution_potential: f64,
    /// Evaluation time
    pub timestamp: Time,
}

/// Forecast of when an organism reaches a target fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "prediction", rename_all = "snake_case")]
pub enum Prediction {
    /// Fewer than two evaluations
    InsufficientData,
    /// All recent evaluations share one generation, so no trend exists
    Unknown,
    /// Fitness is not improving
    Stagnant {
        /// Latest fitness
        current_fitness: f64,
        /// Fitness change per generation
        improvement_rate: f64,
    },
    /// Fitness is improving
    Success {
        /// Latest fitness
        current_fitness: f64,
        /// Requested target
        target_fitness: f64,
        /// Generations until the target, truncated
        generations_needed: i64,
        /// Generation at which the target is reached, truncated
        predicted_generation: i64,
        /// Fitness change per generation
        improvement_rate: f64,
        /// Goodness of fit in `[0, 1]`
        confidence: f64,
    },
}

impl Prediction {
    /// Confidence attached to the forecast.
    pub fn confidence(&self) -> f64 {
        match self {
            Prediction::InsufficientData | Prediction::Unknown => 0.0,
            Prediction::Stagnant { .. } => 0.5,
            Prediction::Success { confidence, .. } => *confidence,
        }
    }
}

/// Every fitness report produced during a run.
#[derive(Debug, Clone, Default)]
pub struct EvaluationHistory {
    reports: Vec<FitnessReport>,
}

impl EvaluationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a report.
    pub fn record(&mut self, report: FitnessReport) {
        self.reports.push(report);
    }

    /// Number of reports.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether no report was recorded.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Latest-generation report of an organism.
    pub fn latest(&self, organism_id: &OrganismId) -> Option<&FitnessReport> {
        self.reports
            .iter()
            .filter(|r| &r.organism_id == organism_id)
            .max_by_key(|r| r.generation)
    }

    /// Latest reports of the given organisms, best fitness first.
    pub fn compare(&self, organism_ids: &[OrganismId]) -> Vec<&FitnessReport> {
        let mut latest: Vec<&FitnessReport> =
            organism_ids.iter().filter_map(|id| self.latest(id)).collect();
        latest.sort_by(|a, b| b.total_fitness.total_cmp(&a.total_fitness));
        latest
    }

    /// Fitness trajectory of an organism, ordered by generation.
    pub fn trajectory(&self, organism_id: &OrganismId) -> Vec<TrajectoryPoint> {
        let mut points: Vec<TrajectoryPoint> = self
            .reports
            .iter()
            .filter(|r| &r.organism_id == organism_id)
            .map(|r| TrajectoryPoint {
                generation: r.generation,
                fitness: r.total_fitness,
                phi: r.signals.phi,
                lambda: r.signals.lambda,
                evolution_potential: r.evolution_potential,
                timestamp: r.timestamp,
            })
            .collect();
        points.sort_by_key(|p| p.generation);
        points
    }

    /// Forecast when `organism_id` reaches `target_fitness`, from a
    /// least-squares line through its most recent evaluations.
    pub fn predict(&self, organism_id: &OrganismId, target_fitness: f64) -> Prediction {
        let trajectory = self.trajectory(organism_id);
        if trajectory.len() < 2 {
            return Prediction::InsufficientData;
        }

        let recent = &trajectory[trajectory.len().saturating_sub(PREDICTION_WINDOW)..];
        let xs: Vec<f64> = recent.iter().map(|p| p.generation as f64).collect();
        let ys: Vec<f64> = recent.iter().map(|p| p.fitness).collect();

        let n = xs.len() as f64;
        let sum_x: f64 = xs.iter().sum();
        let sum_y: f64 = ys.iter().sum();
        let sum_xy: f64 = xs.iter().zip(&ys).map(|(x, y)| x * y).sum();
        let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

        let denom = n * sum_xx - sum_x * sum_x;
        if denom == 0.0 {
            return Prediction::Unknown;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denom;

        let current_fitness = ys[ys.len() - 1];
        let current_generation = xs[xs.len() - 1];

        if slope <= 0.0 {
            return Prediction::Stagnant {
                current_fitness,
                improvement_rate: slope,
            };
        }

        let generations_needed = (target_fitness - current_fitness) / slope;
        let intercept = current_fitness - slope * current_generation;
        let mean_y = sum_y / n;
        let ss_res: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();
        let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Prediction::Success {
            current_fitness,
            target_fitness,
            generations_needed: generations_needed as i64,
            predicted_generation: (current_generation + generations_needed) as i64,
            improvement_rate: slope,
            confidence: r_squared.clamp(0.0, 1.0),
        }
    }
}
