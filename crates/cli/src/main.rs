//! Helix CLI - job scheduling and organism evolution.

mod circuit;
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use helix_core::OrganismId;
use helix_evolution::{EvaluationHistory, FitnessEvaluator, WeightedFitnessEvaluator};
use helix_execution::{Scheduler, SimulatedBackend, SubmitRequest};
use helix_registry::{
    species_key, Genome, MutationSpec, NewOrganism, OrganismPatch, OrganismRegistry, RankMetric,
    DEFAULT_SHIFT_FACTOR,
};
use helix_storage::{JobStore, JsonJobStore, MemoryJobStore};
use crate::config::HelixConfig;

const DEFAULT_SEED: &str = "ORGANISM Aurora {
  qubits: 3
  coherence: 0.75
  gates: [h, cx, ry(0.5), cz, rz(1.25)]
}
";

/// How long to wait for a single job.
const JOB_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "helix")]
#[command(about = "Job scheduling and organism lineage", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evolution experiment on the simulated backend
    Run {
        /// Generations to evolve
        #[arg(long, default_value = "5")]
        generations: u32,
        /// Leaders executed per generation
        #[arg(long, default_value = "3")]
        jobs_per_generation: usize,
        /// Genetic code of the seed organism
        #[arg(long)]
        seed_file: Option<PathBuf>,
        /// Shots per job
        #[arg(long, default_value = "1024")]
        shots: u32,
        /// Parameter shift factor applied when evolving
        #[arg(long, default_value_t = DEFAULT_SHIFT_FACTOR)]
        factor: f64,
        /// Limit the shift to these trait keys
        #[arg(long, value_delimiter = ',')]
        shift_fields: Vec<String>,
        /// Directory for the JSON job store (overrides the config file)
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
    /// Show the species, numeric literals and traits of a genome file
    Inspect {
        /// Genome file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => HelixConfig::load(path).await?,
        None => HelixConfig::default(),
    };

    match cli.command {
        Commands::Run {
            generations,
            jobs_per_generation,
            seed_file,
            shots,
            factor,
            shift_fields,
            store_dir,
        } => {
            let seed = match seed_file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading seed {}", path.display()))?,
                None => DEFAULT_SEED.to_string(),
            };
            let mutation = if shift_fields.is_empty() {
                MutationSpec::new().shift_parameters(factor)
            } else {
                MutationSpec::new().shift_fields(factor, shift_fields)
            };
            mutation.validate()?;

            let store_dir = store_dir.or(config.store_dir.clone());
            let experiment = Experiment {
                generations,
                jobs_per_generation: jobs_per_generation.max(1),
                shots,
                mutation,
            };
            run(config, store_dir, &seed, experiment).await?;
        }
        Commands::Inspect { file } => {
            let code = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let genome = Genome::parse(&code);

            println!("Genome: {}", file.display());
            println!("  Species: {}", species_key(&code));
            println!("  Numeric literals: {}", genome.numbers().len());
            println!("  Traits: {}", genome.trait_keys().join(", "));
            println!("  Circuit gates: {}", circuit::compile(&code).n_gates);
        }
    }

    Ok(())
}

struct Experiment {
    generations: u32,
    jobs_per_generation: usize,
    shots: u32,
    mutation: MutationSpec,
}

async fn run(
    config: HelixConfig,
    store_dir: Option<PathBuf>,
    seed: &str,
    experiment: Experiment,
) -> Result<()> {
    let ttl = config.scheduler.job_ttl();
    let store: Arc<dyn JobStore> = match &store_dir {
        Some(dir) => Arc::new(JsonJobStore::with_retention(dir, ttl).await?),
        None => Arc::new(MemoryJobStore::with_retention(ttl)),
    };
    match store.purge_expired().await {
        Ok(0) => {}
        Ok(n) => info!("Purged {} expired job(s)", n),
        Err(e) => warn!("Failed to purge expired jobs: {}", e),
    }
    let scheduler = Scheduler::with_config(
        store,
        Arc::new(SimulatedBackend::default()),
        config.scheduler.clone(),
    );
    scheduler.start().await;

    let evaluator = WeightedFitnessEvaluator::new(config.evaluator.clone());
    let mut history = EvaluationHistory::new();
    let mut registry = OrganismRegistry::new();
    let seed_id = registry.register(NewOrganism::new("seed", seed).author("helix-cli"))?;
    info!("Seed organism {} ({})", seed_id, species_key(seed));

    let mut latest = seed_id.clone();
    for generation in 0..experiment.generations {
        let leaders: Vec<OrganismId> = registry
            .top_organisms(RankMetric::Fitness, experiment.jobs_per_generation)
            .iter()
            .map(|o| o.id.clone())
            .collect();

        let mut submitted = Vec::new();
        for (rank, organism_id) in leaders.iter().enumerate() {
            let Some(organism) = registry.get(organism_id) else { continue };
            let circuit = circuit::compile(&organism.genetic_code);
            let qasm = circuit.qasm.clone();
            let request = SubmitRequest::new(organism_id.clone(), circuit)
                .shots(experiment.shots)
                .priority(rank as i32)
                .metadata("generation", serde_json::json!(generation));
            let job_id = scheduler.submit(request).await?;
            let patch = OrganismPatch {
                circuit_qasm: Some(qasm),
                ..Default::default()
            };
            registry.update(organism_id, patch);
            submitted.push((organism_id.clone(), job_id));
        }

        for (organism_id, job_id) in submitted {
            let Some(job) = scheduler.wait_for_completion(&job_id, JOB_TIMEOUT).await else {
                warn!("Job {} did not finish in time", job_id);
                continue;
            };
            let (Some(signals), Some(organism)) = (job.result.as_ref(), registry.get(&organism_id))
            else {
                warn!("Job {} ended {} without a result", job_id, job.status);
                continue;
            };

            let report = evaluator.evaluate(&organism_id, signals, organism.generation);
            println!(
                "gen {:>3} | {} | fitness {:.4} | phi {:.4} | {}",
                generation, organism.name, report.total_fitness, signals.phi, report.recommendation
            );
            registry.update(
                &organism_id,
                OrganismPatch {
                    fitness: Some(report.total_fitness),
                    consciousness_level: Some(signals.phi),
                    ..Default::default()
                },
            );
            history.record(report);
        }

        let leader = registry.top_organisms(RankMetric::Fitness, 1).first().map(|o| o.id.clone());
        let Some(best) = leader else {
            break;
        };
        latest = registry.evolve(&best, &experiment.mutation)?;
    }

    print_summary(&registry, &history, &scheduler, &latest).await;
    scheduler.shutdown().await;
    Ok(())
}

async fn print_summary(
    registry: &OrganismRegistry,
    history: &EvaluationHistory,
    scheduler: &Scheduler,
    latest: &OrganismId,
) {
    let stats = registry.statistics();
    println!();
    println!("Registry");
    println!("  Organisms: {}", stats.total_organisms);
    println!("  Species: {}", stats.species_count);
    println!("  Max generation: {}", stats.max_generation);
    println!("  Fitness: avg {:.4} / max {:.4}", stats.average_fitness, stats.max_fitness);
    println!("  Diversity: {:.4}", stats.diversity_index);
    println!("  Evaluations: {}", history.len());

    println!("Lineage of {}", latest);
    for ancestor in registry.lineage(latest) {
        println!(
            "  gen {:>3} | {} | fitness {:.4}",
            ancestor.generation, ancestor.name, ancestor.fitness
        );
    }

    if let Some(best) = registry.top_organisms(RankMetric::Fitness, 1).first() {
        let prediction = history.predict(&best.id, 0.8);
        println!("Best: {} (fitness {:.4})", best.name, best.fitness);
        println!("  Prediction: {:?}", prediction);
    }

    let queue = scheduler.queue_status().await;
    println!("Evolution records: {}", queue.evolution_records);
    for organism in registry.top_organisms(RankMetric::Fitness, 3) {
        for record in scheduler.evolution_history(&organism.id, 3).await {
            println!(
                "  #{} {} via {} phi {:.4}",
                record.generation, organism.name, record.job_id, record.signals.phi
            );
        }
    }

    if queue.active_jobs > 0 {
        warn!("{} job(s) still active", queue.active_jobs);
    }
    if let Some(job_id) = queue.running.as_ref() {
        warn!("Job {} still running", job_id);
    }
}
