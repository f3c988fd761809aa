//! Job model - one request to execute a circuit against a backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::id::{JobId, OrganismId};
use crate::signals::{CircuitSpec, CostEstimate, RawSignals};
use crate::Time;

/// Job lifecycle status.
///
/// ```text
/// Pending → Queued → Running → Completed | Failed
/// Pending | Queued → Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet enqueued
    Pending,
    /// Waiting in the priority queue
    Queued,
    /// Executing on the backend
    Running,
    /// Finished with a result
    Completed,
    /// Backend raised an error
    Failed,
    /// Cancelled before execution
    Cancelled,
}

impl JobStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Whether the job may still be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Queued)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Queued, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Pending, Cancelled)
                | (Queued, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal job transition {from} -> {to} for {job_id}")]
pub struct TransitionError {
    /// Job that was being moved
    pub job_id: JobId,
    /// Current status
    pub from: JobStatus,
    /// Requested status
    pub to: JobStatus,
}

/// A circuit execution request and its lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Organism the circuit belongs to
    pub organism_id: OrganismId,
    /// Circuit to execute
    pub circuit: CircuitSpec,
    /// Number of shots
    pub shots: u32,
    /// Backend name
    pub backend: String,
    /// Scheduling priority (lower runs first)
    pub priority: i32,
    /// Current status
    pub status: JobStatus,
    /// Created timestamp
    pub created_at: Time,
    /// Started timestamp (None until running)
    pub started_at: Option<Time>,
    /// Completed timestamp (None until terminal)
    pub completed_at: Option<Time>,
    /// Raw signals (set when completed)
    pub result: Option<RawSignals>,
    /// Error text (set when failed)
    pub error: Option<String>,
    /// Cost estimate taken at submission
    pub cost_estimate: Option<CostEstimate>,
    /// Caller-supplied metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Job {
    /// Create a pending job.
    pub fn new(
        organism_id: OrganismId,
        circuit: CircuitSpec,
        shots: u32,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            organism_id,
            circuit,
            shots,
            backend: backend.into(),
            priority: 0,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            cost_estimate: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Move the job to `next`, stamping start/completion times.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        let now = chrono::Utc::now();
        if next == JobStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Record a successful run.
    pub fn complete(&mut self, signals: RawSignals) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(signals);
        Ok(())
    }

    /// Record a failed run.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Wall-clock execution time, once the job has finished running.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_job() -> Job {
        Job::new(
            OrganismId::from("org_test"),
            CircuitSpec::from_qasm("qreg q[1]; h q[0];"),
            100,
            "simulator",
        )
    }

    #[test]
    fn test_happy_path() {
        let mut job = test_job();
        job.transition(JobStatus::Queued).unwrap();
        job.transition(JobStatus::Running).unwrap();
        assert!(job.started_at.is_some());
        job.fail("backend exploded").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("backend exploded"));
        assert!(job.completed_at.is_some());
        assert!(job.duration().is_some());
    }

    #[test]
    fn test_cannot_skip_queued() {
        let mut job = test_job();
        let err = job.transition(JobStatus::Running).unwrap_err();
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(err.to, JobStatus::Running);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_running_is_not_cancellable() {
        let mut job = test_job();
        job.transition(JobStatus::Queued).unwrap();
        job.transition(JobStatus::Running).unwrap();
        assert!(!job.status.is_cancellable());
        assert!(job.transition(JobStatus::Cancelled).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL_STATUSES {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    const ALL_STATUSES: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    proptest! {
        #[test]
        fn prop_random_sequences_never_leave_a_terminal_state(
            ops in proptest::collection::vec(0usize..6, 0..24)
        ) {
            let mut job = test_job();
            let mut terminal_seen: Option<JobStatus> = None;
            let mut history = vec![job.status];

            for op in ops {
                let before = job.status;
                let next = ALL_STATUSES[op];
                match job.transition(next) {
                    Ok(()) => {
                        prop_assert!(before.can_transition_to(next));
                        history.push(next);
                    }
                    Err(_) => prop_assert_eq!(job.status, before),
                }
                if job.status.is_terminal() {
                    if let Some(seen) = terminal_seen {
                        prop_assert_eq!(seen, job.status);
                    }
                    terminal_seen = Some(job.status);
                }
            }

            // Running is only ever entered from Queued, and Queued only from Pending.
            for pair in history.windows(2) {
                match pair[1] {
                    JobStatus::Running => prop_assert_eq!(pair[0], JobStatus::Queued),
                    JobStatus::Queued => prop_assert_eq!(pair[0], JobStatus::Pending),
                    JobStatus::Completed | JobStatus::Failed => {
                        prop_assert_eq!(pair[0], JobStatus::Running)
                    }
                    _ => {}
                }
            }
        }
    }
}
