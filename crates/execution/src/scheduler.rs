//! Job scheduler - priority queue, serial execution loop and callbacks.
//!
//! ```text
//! submit → Queued ──(lowest priority, then FIFO)──→ Running → Completed | Failed
//!            └── cancel / shutdown ──→ Cancelled
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use helix_core::{BackendHealth, CircuitSpec, EvolutionRecord, Job, JobId, JobStatus, OrganismId};
use helix_evolution::{EvolutionLog, EvolutionTrigger};
use helix_storage::JobStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use crate::backend::{BackendError, ExecutionBackend};
use crate::config::SchedulerConfig;

/// Default shots per job.
pub const DEFAULT_SHOTS: u32 = 1024;

/// Poll interval of [`Scheduler::wait_for_completion`].
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shots per trial run of [`Scheduler::optimize_circuit`].
pub const OPTIMIZATION_SHOTS: u32 = 512;

/// Rotation angle of the layers added by [`Scheduler::optimize_circuit`].
const LAYER_ROTATION: &str = "pi/4";

/// Errors returned synchronously by the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Rejected submission
    #[error("validation error: {0}")]
    Validation(String),

    /// Scheduler no longer accepts work
    #[error("scheduler is shutting down")]
    ShuttingDown,
}

/// Invoked once when a job reaches `Completed` or `Failed`.
#[async_trait]
pub trait JobCallback: Send + Sync {
    /// Handle the finished job. Errors are logged and otherwise ignored.
    async fn on_complete(&self, job: &Job) -> anyhow::Result<()>;
}

struct FnCallback<F>(F);

#[async_trait]
impl<F, Fut> JobCallback for FnCallback<F>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_complete(&self, job: &Job) -> anyhow::Result<()> {
        (self.0)(job.clone()).await
    }
}

/// Wrap an async closure as a [`JobCallback`].
pub fn callback_fn<F, Fut>(f: F) -> Arc<dyn JobCallback>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnCallback(f))
}

/// A job submission.
pub struct SubmitRequest {
    /// Organism the circuit belongs to
    pub organism_id: OrganismId,
    /// Circuit to execute
    pub circuit: CircuitSpec,
    /// Shots (must be positive)
    pub shots: u32,
    /// Priority; lower runs first
    pub priority: i32,
    /// Completion callback
    pub callback: Option<Arc<dyn JobCallback>>,
    /// Caller metadata copied onto the job
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SubmitRequest {
    /// Create a request with default shots and priority 0.
    pub fn new(organism_id: OrganismId, circuit: CircuitSpec) -> Self {
        Self {
            organism_id,
            circuit,
            shots: DEFAULT_SHOTS,
            priority: 0,
            callback: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the shot count.
    pub fn shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a completion callback.
    pub fn callback(mut self, callback: Arc<dyn JobCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Add a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Priority queue entry. Ordered only by `(priority, sequence)`, smallest
/// first; the job itself lives in the active map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Job priority
    pub priority: i32,
    /// Submission sequence number
    pub sequence: u64,
    /// Queued job
    pub job_id: JobId,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest entry: lower priority wins
        let priority_cmp = other.priority.cmp(&self.priority);
        if priority_cmp != Ordering::Equal {
            return priority_cmp;
        }

        // Earlier submission first (FIFO within same priority)
        other.sequence.cmp(&self.sequence)
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Entries waiting in the queue
    pub queue_depth: usize,
    /// Jobs not yet terminal
    pub active_jobs: usize,
    /// Job currently executing
    pub running: Option<JobId>,
    /// Queued entries in dequeue order
    pub queued: Vec<QueuedJob>,
    /// Backend health
    pub backend: BackendHealth,
    /// Evolution records appended so far
    pub evolution_records: u64,
}

/// Result of [`Scheduler::optimize_circuit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitOptimization {
    /// Circuit with every added layer
    pub circuit: CircuitSpec,
    /// Primary signal of the last trial run
    pub phi: f64,
    /// Trial runs performed
    pub iterations: u32,
    /// Whether `phi` reached the target
    pub reached_target: bool,
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<QueuedJob>,
    active: HashMap<JobId, Job>,
    callbacks: HashMap<JobId, Vec<Arc<dyn JobCallback>>>,
    sequence: u64,
    running: Option<JobId>,
    shutting_down: bool,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    store: Arc<dyn JobStore>,
    backend: Arc<dyn ExecutionBackend>,
    trigger: EvolutionTrigger,
    evolution_log: EvolutionLog,
    worker: Mutex<Option<JoinHandle<()>>>,
    // Held for the duration of every backend call.
    executor: Mutex<()>,
    purge_interval: Duration,
    last_purge: Mutex<Option<tokio::time::Instant>>,
}

/// Serial job scheduler.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler with the default configuration.
    pub fn new(store: Arc<dyn JobStore>, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self::with_config(store, backend, SchedulerConfig::default())
    }

    /// Create a scheduler.
    pub fn with_config(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn ExecutionBackend>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                store,
                backend,
                trigger: EvolutionTrigger::new(config.evolution_threshold),
                evolution_log: EvolutionLog::new(config.evolution_history_limit),
                worker: Mutex::new(None),
                executor: Mutex::new(()),
                purge_interval: config.purge_interval(),
                last_purge: Mutex::new(None),
            }),
        }
    }

    /// Validate and enqueue a job. Returns without waiting for execution.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId, SchedulerError> {
        if request.organism_id.is_blank() {
            return Err(SchedulerError::Validation("organism id is empty".into()));
        }
        if request.shots == 0 {
            return Err(SchedulerError::Validation("shots must be positive".into()));
        }

        let cost = self.inner.backend.estimate_cost(&request.circuit, request.shots);
        let mut job = Job::new(
            request.organism_id,
            request.circuit,
            request.shots,
            self.inner.backend.name(),
        );
        job.priority = request.priority;
        job.cost_estimate = Some(cost);
        job.metadata.extend(request.metadata);

        let mut state = self.inner.state.lock().await;
        if state.shutting_down {
            return Err(SchedulerError::ShuttingDown);
        }
        self.persist(&job).await;

        if let Err(e) = job.transition(JobStatus::Queued) {
            return Err(SchedulerError::Validation(e.to_string()));
        }
        if let Some(callback) = request.callback {
            state.callbacks.entry(job.id.clone()).or_default().push(callback);
        }

        let entry = QueuedJob {
            priority: job.priority,
            sequence: state.sequence,
            job_id: job.id.clone(),
        };
        state.sequence += 1;
        self.persist(&job).await;
        state.heap.push(entry);

        let job_id = job.id.clone();
        info!(
            "Submitted job {} for {} (priority={}, shots={}, est. ${:.4})",
            job_id,
            job.organism_id,
            job.priority,
            job.shots,
            job.cost_estimate.as_ref().map(|c| c.estimated_cost_usd).unwrap_or_default()
        );
        state.active.insert(job_id.clone(), job);
        drop(state);

        self.inner.notify.notify_one();
        Ok(job_id)
    }

    /// Current job state: the live copy while active, else the stored one.
    pub async fn status(&self, job_id: &JobId) -> Option<Job> {
        if let Some(job) = self.inner.state.lock().await.active.get(job_id) {
            return Some(job.clone());
        }
        match self.inner.store.get(job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!("Failed to load job {}: {}", job_id, e);
                None
            }
        }
    }

    /// Cancel a pending or queued job. Returns false for running, finished or
    /// unknown jobs. Callbacks of a cancelled job are dropped without being
    /// invoked.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        let mut state = self.inner.state.lock().await;
        let cancelled = self.cancel_locked(&mut state, job_id).await;
        if cancelled {
            info!("Cancelled job {}", job_id);
        }
        cancelled
    }

    async fn cancel_locked(&self, state: &mut State, job_id: &JobId) -> bool {
        let Some(job) = state.active.get_mut(job_id) else {
            return false;
        };
        if !job.status.is_cancellable() || job.transition(JobStatus::Cancelled).is_err() {
            return false;
        }
        let job = job.clone();

        state.heap.retain(|entry| &entry.job_id != job_id);
        state.callbacks.remove(job_id);
        self.persist(&job).await;
        state.active.remove(job_id);
        true
    }

    /// Snapshot of the queue.
    pub async fn queue_status(&self) -> QueueSnapshot {
        let (queued, active_jobs, running) = {
            let state = self.inner.state.lock().await;
            let mut queued = state.heap.clone().into_sorted_vec();
            queued.reverse();
            (queued, state.active.len(), state.running.clone())
        };

        QueueSnapshot {
            queue_depth: queued.len(),
            active_jobs,
            running,
            queued,
            backend: self.inner.backend.health(),
            evolution_records: self.inner.evolution_log.total().await,
        }
    }

    /// Alias of [`Scheduler::queue_status`].
    pub async fn list_queue(&self) -> QueueSnapshot {
        self.queue_status().await
    }

    /// Add a callback to a job that has not finished yet.
    pub async fn register_callback(&self, job_id: &JobId, callback: Arc<dyn JobCallback>) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.active.get(job_id) {
            Some(job) if !job.status.is_terminal() => {
                state.callbacks.entry(job_id.clone()).or_default().push(callback);
                true
            }
            _ => false,
        }
    }

    /// Poll until the job is terminal. `None` on timeout or unknown job.
    pub async fn wait_for_completion(&self, job_id: &JobId, timeout: Duration) -> Option<Job> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(job) = self.status(job_id).await {
                if job.status.is_terminal() {
                    return Some(job);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Evolution records of an organism, newest first.
    pub async fn evolution_history(
        &self,
        organism_id: &OrganismId,
        limit: usize,
    ) -> Vec<EvolutionRecord> {
        self.inner.evolution_log.history(organism_id, limit).await
    }

    /// Spawn the execution loop. Calling it again while the loop runs is a no-op.
    pub async fn start(&self) {
        let mut worker = self.inner.worker.lock().await;
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let scheduler = self.clone();
        *worker = Some(tokio::spawn(async move { scheduler.run().await }));
        info!("Scheduler started on backend {}", self.inner.backend.name());
    }

    /// Execute queued jobs one at a time until shutdown.
    pub async fn run(&self) {
        loop {
            if self.inner.state.lock().await.shutting_down {
                break;
            }
            if self.run_next().await.is_none() {
                self.inner.notify.notified().await;
            }
        }
        debug!("Execution loop stopped");
    }

    /// Execute the next queued job, if any, and return its id.
    ///
    /// Concurrent callers are serialized: a second call waits until the
    /// backend call of the first has returned.
    pub async fn run_next(&self) -> Option<JobId> {
        let slot = self.inner.executor.lock().await;
        let job = {
            let mut state = self.inner.state.lock().await;
            let job = loop {
                let entry = state.heap.pop()?;
                let Some(job) = state.active.get_mut(&entry.job_id) else {
                    debug!("Skipping stale queue entry {}", entry.job_id);
                    continue;
                };
                if job.transition(JobStatus::Running).is_ok() {
                    break job.clone();
                }
            };
            state.running = Some(job.id.clone());
            self.persist(&job).await;
            job
        };

        info!("Running job {} (priority={})", job.id, job.priority);
        let backend = Arc::clone(&self.inner.backend);
        let circuit = job.circuit.clone();
        let shots = job.shots;
        let outcome = tokio::task::spawn_blocking(move || backend.execute(&circuit, shots)).await;

        let (finished, callbacks) = {
            let mut state = self.inner.state.lock().await;
            state.running = None;
            let Some(live) = state.active.get_mut(&job.id) else {
                warn!("Job {} left the active set while running", job.id);
                return Some(job.id);
            };

            let transitioned = match outcome {
                Ok(Ok(signals)) => live.complete(signals),
                Ok(Err(e)) => {
                    error!("Job {} failed: {}", live.id, e);
                    live.fail(e.to_string())
                }
                Err(e) => {
                    error!("Job {} worker crashed: {}", live.id, e);
                    live.fail(format!("worker crashed: {}", e))
                }
            };
            if let Err(e) = transitioned {
                error!("{}", e);
            }
            let finished = live.clone();

            if let Some(record) = self.inner.trigger.evaluate(&finished) {
                let record = self.inner.evolution_log.record(record).await;
                info!(
                    "Evolution event #{} for {} (phi={:.4})",
                    record.generation, record.organism_id, record.signals.phi
                );
            }

            self.persist(&finished).await;
            state.active.remove(&finished.id);
            let callbacks = state.callbacks.remove(&finished.id).unwrap_or_default();
            (finished, callbacks)
        };
        drop(slot);
        self.purge_if_due().await;

        if finished.status == JobStatus::Completed {
            info!(
                "Completed job {} in {}ms",
                finished.id,
                finished.duration().map(|d| d.num_milliseconds()).unwrap_or_default()
            );
        }
        self.invoke_callbacks(finished.clone(), callbacks).await;
        Some(finished.id)
    }

    async fn invoke_callbacks(&self, job: Job, callbacks: Vec<Arc<dyn JobCallback>>) {
        let job = Arc::new(job);
        for callback in callbacks {
            let task_job = Arc::clone(&job);
            let handle = tokio::spawn(async move { callback.on_complete(&task_job).await });
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Callback for job {} failed: {}", job.id, e),
                Err(e) => error!("Callback for job {} panicked: {}", job.id, e),
            }
        }
    }

    /// Grow `circuit` until a trial run reaches `target_phi` or
    /// `max_iterations` runs were made.
    ///
    /// Each iteration adds a CX chain over neighbouring qubits and an RY
    /// rotation on every qubit, then executes the circuit with
    /// [`OPTIMIZATION_SHOTS`] shots. Trial runs bypass the queue but never
    /// overlap a job.
    pub async fn optimize_circuit(
        &self,
        circuit: CircuitSpec,
        target_phi: f64,
        max_iterations: u32,
    ) -> Result<CircuitOptimization, BackendError> {
        let mut circuit = circuit;
        let mut phi = 0.0;
        let mut iterations = 0;

        while phi < target_phi && iterations < max_iterations {
            circuit = with_entangling_layer(&circuit);

            let _slot = self.inner.executor.lock().await;
            let backend = Arc::clone(&self.inner.backend);
            let trial = circuit.clone();
            let signals = tokio::task::spawn_blocking(move || {
                backend.execute(&trial, OPTIMIZATION_SHOTS)
            })
            .await
                .map_err(|e| BackendError::Execution(format!("worker crashed: {}", e)))??;

            phi = signals.phi;
            iterations += 1;
            info!("Optimization iteration {}: phi={:.3}", iterations, phi);
        }

        Ok(CircuitOptimization {
            circuit,
            phi,
            iterations,
            reached_target: phi >= target_phi,
        })
    }

    /// Stop accepting work, cancel everything still pending or queued and
    /// wait for the loop to exit. A running job finishes first.
    ///
    /// Must not be awaited from inside a job callback.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.shutting_down = true;

            let pending: Vec<JobId> = state
                .active
                .values()
                .filter(|job| job.status.is_cancellable())
                .map(|job| job.id.clone())
                .collect();
            for job_id in &pending {
                self.cancel_locked(&mut state, job_id).await;
            }
            info!("Scheduler shutting down, cancelled {} job(s)", pending.len());
        }

        self.inner.notify.notify_one();
        let worker = self.inner.worker.lock().await.take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!("Execution loop ended abnormally: {}", e);
            }
        }
    }

    /// Drop expired jobs from the store once per purge interval.
    async fn purge_if_due(&self) {
        {
            let mut last = self.inner.last_purge.lock().await;
            if last.is_some_and(|at| at.elapsed() < self.inner.purge_interval) {
                return;
            }
            *last = Some(tokio::time::Instant::now());
        }
        match self.inner.store.purge_expired().await {
            Ok(0) => {}
            Ok(n) => debug!("Purged {} expired job(s)", n),
            Err(e) => warn!("Failed to purge expired jobs: {}", e),
        }
    }

    async fn persist(&self, job: &Job) {
        if let Err(e) = self.inner.store.put(job).await {
            warn!("Failed to persist job {} ({}): {}", job.id, job.status, e);
        }
    }
}

/// Insert one CX chain and one rotation layer before the measurements.
fn with_entangling_layer(circuit: &CircuitSpec) -> CircuitSpec {
    let mut layer = String::new();
    for i in 1..circuit.n_qubits {
        layer.push_str(&format!("cx q[{}],q[{}];\n", i - 1, i));
    }
    for i in 0..circuit.n_qubits {
        layer.push_str(&format!("ry({}) q[{}];\n", LAYER_ROTATION, i));
    }

    let mut qasm = circuit.qasm.clone();
    match qasm.find("measure") {
        Some(at) => qasm.insert_str(at, &layer),
        None => {
            if !qasm.is_empty() && !qasm.ends_with('\n') {
                qasm.push('\n');
            }
            qasm.push_str(&layer);
        }
    }
    CircuitSpec::from_qasm(qasm)
}
