//! Synthetic incident-attribution benchmark harness.
//!
//! A run resolves a scenario, synthesizes (or loads) labeled incidents,
//! attributes each one to a fault domain, and writes a provenance-stamped
//! artifact bundle.

pub mod domain;
pub mod error;
pub mod evaluate;
pub mod metrics;
pub mod provenance;
pub mod report;
pub mod sample;
pub mod scenario;
pub mod writer;

pub use error::BenchError;
pub use metrics::AttributionSummary;
pub use provenance::{ProvenanceRecord, RunnerEnvironment};
pub use writer::ARTIFACT_NAMES;

use chrono::Utc;
use provenance::InputSource;
use slo_config::ToolkitConfig;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct BenchRequest {
    pub out_dir: PathBuf,
    pub scenario: String,
    pub workload_profile: String,
    pub input: Option<PathBuf>,
    pub seed: Option<u64>,
    pub sample_count: Option<usize>,
    pub workers: usize,
    pub config: ToolkitConfig,
}

impl BenchRequest {
    pub fn new(out_dir: &Path, scenario: &str, workload_profile: &str) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            scenario: scenario.to_string(),
            workload_profile: workload_profile.to_string(),
            input: None,
            seed: None,
            sample_count: None,
            workers: 1,
            config: ToolkitConfig::default(),
        }
    }

    pub fn with_input(mut self, fixture_path: &Path) -> Self {
        self.input = Some(fixture_path.to_path_buf());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub out_dir: PathBuf,
    pub artifacts: Vec<PathBuf>,
    pub summary: AttributionSummary,
    pub provenance: ProvenanceRecord,
}

/// Runs the harness with process environment provenance.
pub fn generate_artifacts(out_dir: &Path, scenario: &str, workload_profile: &str) -> Result<(), BenchError> {
    let request = BenchRequest::new(out_dir, scenario, workload_profile);
    run_bench(&request, &RunnerEnvironment::from_process_env()).map(|_| ())
}

/// Like [`generate_artifacts`], but every non-empty fixture line becomes one
/// sample instead of synthesizing.
pub fn generate_artifacts_with_input(
    out_dir: &Path,
    scenario: &str,
    workload_profile: &str,
    fixture_path: &Path,
) -> Result<(), BenchError> {
    let request = BenchRequest::new(out_dir, scenario, workload_profile).with_input(fixture_path);
    run_bench(&request, &RunnerEnvironment::from_process_env()).map(|_| ())
}

/// Runs one benchmark. Scenario and fixture errors surface before anything is
/// written to `request.out_dir`.
pub fn run_bench(request: &BenchRequest, env: &RunnerEnvironment) -> Result<BenchOutcome, BenchError> {
    let policy = scenario::resolve(&request.scenario)?;
    let scenario_name = policy.scenario.name();
    let workload_profile = match request.workload_profile.trim() {
        "" => scenario::DEFAULT_WORKLOAD_PROFILE,
        p => p,
    };
    let started = Instant::now();

    let (samples, input_source, seed, input_sha256) = match &request.input {
        Some(path) => {
            let fixture = sample::load_fixture(path, scenario_name, workload_profile)?;
            (
                fixture.samples,
                InputSource::Fixture(fixture.path),
                None,
                Some(fixture.sha256),
            )
        }
        None => {
            let seed = request.seed.unwrap_or_else(clock_seed);
            let count = request.sample_count.unwrap_or(policy.default_samples);
            let samples = sample::synthesize(&policy, workload_profile, count, seed, &request.config);
            (samples, InputSource::Synthetic, Some(seed), None)
        }
    };
    info!(
        scenario = scenario_name,
        workload_profile,
        samples = samples.len(),
        input = %input_source,
        "starting attribution benchmark"
    );

    let predictions = evaluate::predict_all(&samples, request.workers);
    let evidence_events = samples.iter().map(|s| s.evidence.len()).sum();
    drop(samples);

    let runner = provenance::resolve(env);
    let (matrix, stats, overhead) = metrics::aggregate(
        &predictions,
        &metrics::OverheadInputs {
            elapsed: started.elapsed(),
            evidence_events,
            capture_active: runner.capture_active(),
            events_per_second_limit: request.config.sampling.events_per_second_limit,
            capture_window_ms: request.config.correlation.window_ms,
            max_overhead_pct: request.config.safety.max_overhead_pct,
        },
    )?;

    let summary = AttributionSummary::assemble(stats, scenario_name, workload_profile, &runner);
    let provenance = ProvenanceRecord {
        runner_mode: runner.runner_mode.clone(),
        release_grade: runner.release_grade,
        scenario: scenario_name.to_string(),
        workload_profile: workload_profile.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        input_source: input_source.to_string(),
        generator: GENERATOR.to_string(),
        sample_count: summary.sample_count,
        seed,
        input_sha256,
        artifacts: ARTIFACT_NAMES.iter().map(|s| s.to_string()).collect(),
    };

    let artifacts = writer::write_artifacts(
        &request.out_dir,
        &writer::ArtifactBundle {
            matrix: &matrix,
            predictions: &predictions,
            summary: &summary,
            overhead: &overhead,
            provenance: &provenance,
        },
    )?;
    info!(
        out_dir = %request.out_dir.display(),
        accuracy = summary.accuracy,
        runner_mode = %summary.runner_mode,
        release_grade = summary.release_grade,
        "attribution benchmark complete"
    );

    Ok(BenchOutcome {
        out_dir: request.out_dir.clone(),
        artifacts,
        summary,
        provenance,
    })
}

fn clock_seed() -> u64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}
