//! Evolution trigger and the bounded log of evolution records.

use std::collections::{HashMap, VecDeque};
use helix_core::{EvolutionRecord, Job, JobStatus, OrganismId};
use tokio::sync::RwLock;
use tracing::debug;

/// Default primary-signal threshold.
pub const DEFAULT_EVOLUTION_THRESHOLD: f64 = 0.5;

/// Default number of records kept per organism.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Decides whether a finished job is an evolution event.
///
/// The trigger only records eligibility; it never creates or changes
/// organisms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionTrigger {
    threshold: f64,
}

impl EvolutionTrigger {
    /// Create a trigger firing strictly above `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Threshold in use.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evolution record for a completed job whose primary signal exceeds the
    /// threshold. The record's `generation` is left at 0 for the log to assign.
    pub fn evaluate(&self, job: &Job) -> Option<EvolutionRecord> {
        if job.status != JobStatus::Completed {
            return None;
        }
        let signals = job.result.as_ref()?;
        if signals.primary() <= self.threshold {
            return None;
        }

        Some(EvolutionRecord {
            organism_id: job.organism_id.clone(),
            job_id: job.id.clone(),
            generation: 0,
            signals: signals.snapshot(),
            backend: job.backend.clone(),
            timestamp: chrono::Utc::now(),
        })
    }
}

impl Default for EvolutionTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_EVOLUTION_THRESHOLD)
    }
}

#[derive(Default)]
struct LogState {
    by_organism: HashMap<OrganismId, VecDeque<EvolutionRecord>>,
    total: u64,
}

/// Evolution records per organism, each capped at `history_limit`.
pub struct EvolutionLog {
    history_limit: usize,
    state: RwLock<LogState>,
}

impl EvolutionLog {
    /// Create a log keeping at most `history_limit` records per organism.
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit,
            state: RwLock::new(LogState::default()),
        }
    }

    /// Append a record, assigning its sequence number. Returns the stored record.
    pub async fn record(&self, mut record: EvolutionRecord) -> EvolutionRecord {
        let mut state = self.state.write().await;
        record.generation = state.total;
        state.total += 1;

        let entries = state.by_organism.entry(record.organism_id.clone()).or_default();
        entries.push_back(record.clone());
        while entries.len() > self.history_limit {
            entries.pop_front();
        }
        debug!(
            "Evolution record #{} for {} (phi={:.4})",
            record.generation, record.organism_id, record.signals.phi
        );
        record
    }

    /// Up to `limit` records of an organism, newest first.
    pub async fn history(&self, organism_id: &OrganismId, limit: usize) -> Vec<EvolutionRecord> {
        let state = self.state.read().await;
        state
            .by_organism
            .get(organism_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Total records ever appended.
    pub async fn total(&self) -> u64 {
        self.state.read().await.total
    }
}

impl Default for EvolutionLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_core::{CircuitSpec, RawSignals};
    use std::collections::BTreeMap;

    fn completed_job(phi: f64) -> Job {
        let mut job = Job::new(
            OrganismId::from("org_t"),
            CircuitSpec::from_qasm("qreg q[1]; h q[0];"),
            100,
            "test",
        );
        job.transition(JobStatus::Queued).unwrap();
        job.transition(JobStatus::Running).unwrap();
        job.complete(RawSignals {
            counts: BTreeMap::new(),
            probabilities: BTreeMap::new(),
            entropy: 0.0,
            lambda: 0.0,
            phi,
            gamma: 1.0,
            coherence_index: 0.0,
            original_depth: 1,
            transpiled_depth: 1,
            n_qubits: 1,
            backend: "test".into(),
            timestamp: chrono::Utc::now(),
        })
        .unwrap();
        job
    }

    #[test]
    fn test_threshold_is_strict() {
        let trigger = EvolutionTrigger::new(0.5);
        assert!(trigger.evaluate(&completed_job(0.5)).is_none());
        let record = trigger.evaluate(&completed_job(0.51)).unwrap();
        assert_eq!(record.organism_id.as_str(), "org_t");
        assert_eq!(record.signals.phi, 0.51);
    }

    #[test]
    fn test_only_completed_jobs() {
        let trigger = EvolutionTrigger::default();
        let mut job = completed_job(0.9);
        job.status = JobStatus::Failed;
        assert!(trigger.evaluate(&job).is_none());
    }

    #[tokio::test]
    async fn test_log_caps_per_organism() {
        let log = EvolutionLog::new(3);
        let trigger = EvolutionTrigger::new(0.1);
        for _ in 0..5 {
            let record = trigger.evaluate(&completed_job(0.7)).unwrap();
            log.record(record).await;
        }

        let history = log.history(&OrganismId::from("org_t"), 10).await;
        let sequence: Vec<u64> = history.iter().map(|r| r.generation).collect();
        assert_eq!(sequence, vec![4, 3, 2]);
        assert_eq!(log.total().await, 5);
        assert_eq!(log.history(&OrganismId::from("org_t"), 1).await.len(), 1);
        assert!(log.history(&OrganismId::from("org_x"), 10).await.is_empty());
    }
}
