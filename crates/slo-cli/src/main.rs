use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use slo_bench::scenario::{Scenario, DEFAULT_WORKLOAD_PROFILE};
use slo_bench::{BenchOutcome, BenchRequest, RunnerEnvironment};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sloctl", version, about = "LLM SLO incident-attribution toolkit")]
struct Cli {
    /// Log progress at info level (overridden by RUST_LOG).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Bench {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        scenario: String,
        #[arg(long, default_value = DEFAULT_WORKLOAD_PROFILE)]
        workload_profile: String,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long, default_value_t = 1)]
        workers: usize,
        #[arg(long)]
        json: bool,
    },
    Scenarios {
        #[arg(long)]
        json: bool,
    },
    ConfigValidate {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    SchemaValidate {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_mode = command_json_mode(&cli.command);
    match run_command(cli.command) {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", format!("{:#}", err), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Bench {
            out,
            scenario,
            workload_profile,
            input,
            config,
            seed,
            samples,
            workers,
            json,
        } => {
            let mut request = BenchRequest::new(&out, &scenario, &workload_profile);
            request.input = input;
            request.seed = seed;
            request.sample_count = samples;
            request.workers = workers.max(1);
            if let Some(path) = config {
                request.config = slo_config::load(&path)?;
                info!(config = %path.display(), "loaded toolkit config");
            }
            let outcome = slo_bench::run_bench(&request, &RunnerEnvironment::from_process_env())
                .with_context(|| format!("bench {} into {}", scenario, out.display()))?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "bench",
                    "outcome": outcome_to_json(&outcome),
                })));
            }
            print_outcome(&outcome);
        }
        Commands::Scenarios { json } => {
            let rows: Vec<Value> = Scenario::ALL
                .iter()
                .map(|s| {
                    let policy = s.policy();
                    json!({
                        "name": s.name(),
                        "default_samples": policy.default_samples,
                        "min_samples": policy.min_samples,
                    })
                })
                .collect();
            if json {
                return Ok(Some(json!({ "ok": true, "command": "scenarios", "scenarios": rows })));
            }
            for s in Scenario::ALL {
                println!("{} (default samples: {})", s.name(), s.policy().default_samples);
            }
        }
        Commands::ConfigValidate { file, json } => {
            let payload = read_structured(&file)?;
            slo_schemas::validate_value(slo_schemas::TOOLKIT_CONFIG_V1ALPHA1, &payload)?;
            let cfg = slo_config::load(&file)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "config-validate",
                    "file": file.display().to_string(),
                    "config": serde_json::to_value(&cfg)?,
                })));
            }
            println!("ok: {}", file.display());
            println!("signals: {}", cfg.signal_set.join(", "));
            println!(
                "sampling: {} ev/s (burst {})",
                cfg.sampling.events_per_second_limit, cfg.sampling.burst_limit
            );
            println!("correlation_window_ms: {}", cfg.correlation.window_ms);
            println!("max_overhead_pct: {}", cfg.safety.max_overhead_pct);
        }
        Commands::SchemaValidate { schema, file, json } => {
            let payload = read_structured(&file)?;
            slo_schemas::validate_value(&schema, &payload)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "schema-validate",
                    "schema": schema,
                    "file": file.display().to_string(),
                })));
            }
            println!("ok: {} matches {}", file.display(), schema);
        }
    }
    Ok(None)
}

/// Reads a JSON or YAML document as a JSON value.
fn read_structured(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse yaml {}", path.display()))?;
        return serde_json::to_value(yaml).map_err(|e| anyhow!("convert {}: {}", path.display(), e));
    }
    serde_json::from_str(&raw).with_context(|| format!("parse json {}", path.display()))
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Bench { json, .. }
        | Commands::Scenarios { json }
        | Commands::ConfigValidate { json, .. }
        | Commands::SchemaValidate { json, .. } => *json,
    }
}

fn outcome_to_json(outcome: &BenchOutcome) -> Value {
    json!({
        "out_dir": outcome.out_dir.display().to_string(),
        "artifacts": outcome
            .artifacts
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
        "scenario": outcome.summary.scenario,
        "workload_profile": outcome.summary.workload_profile,
        "sample_count": outcome.summary.sample_count,
        "accuracy": outcome.summary.accuracy,
        "runner_mode": outcome.summary.runner_mode,
        "release_grade": outcome.summary.release_grade,
        "input_source": outcome.provenance.input_source,
        "seed": outcome.provenance.seed,
    })
}

fn print_outcome(outcome: &BenchOutcome) {
    println!("scenario: {}", outcome.summary.scenario);
    println!("workload_profile: {}", outcome.summary.workload_profile);
    println!("samples: {}", outcome.summary.sample_count);
    println!("accuracy: {:.4}", outcome.summary.accuracy);
    println!("runner_mode: {}", outcome.summary.runner_mode);
    println!("release_grade: {}", outcome.summary.release_grade);
    println!("input_source: {}", outcome.provenance.input_source);
    if let Some(seed) = outcome.provenance.seed {
        println!("seed: {}", seed);
    }
    println!("out_dir: {}", outcome.out_dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_bench_flags() {
        let cli = Cli::try_parse_from([
            "sloctl",
            "bench",
            "--out",
            "/tmp/out",
            "--scenario",
            "mixed_multi",
            "--seed",
            "7",
            "--json",
        ])
        .expect("parse");
        match cli.command {
            Commands::Bench {
                scenario,
                workload_profile,
                seed,
                json,
                ..
            } => {
                assert_eq!(scenario, "mixed_multi");
                assert_eq!(workload_profile, DEFAULT_WORKLOAD_PROFILE);
                assert_eq!(seed, Some(7));
                assert!(json);
            }
            _ => panic!("expected bench"),
        }
    }

    #[test]
    fn json_error_shape_is_stable() {
        let v = json_error("command_failed", "boom".to_string(), json!({}));
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"]["code"], "command_failed");
        assert_eq!(v["error"]["message"], "boom");
    }

    #[test]
    fn read_structured_accepts_yaml() {
        let dir = std::env::temp_dir().join(format!("sloctl_yaml_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("toolkit.yaml");
        fs::write(&path, "kind: ToolkitConfig\nsampling:\n  burst_limit: 5\n").expect("write");
        let value = read_structured(&path).expect("yaml");
        assert_eq!(value["sampling"]["burst_limit"], 5);
        let _ = fs::remove_dir_all(dir);
    }
}
