use serde::Serialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

pub const RUNNER_MODE_ENV: &str = "RUNNER_MODE";
pub const RELEASE_GRADE_ENV: &str = "RELEASE_GRADE";

/// Runner mode of a self-hosted runner with real kernel capture. Only this
/// mode is release grade by default.
pub const SELF_HOSTED_EBPF_MODE: &str = "full-self-hosted-ebpf";
pub const FALLBACK_RUNNER_MODE: &str = "fallback-synthetic-no-self-hosted-ebpf";

/// Snapshot of the environment variables that decide provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerEnvironment {
    pub runner_mode: Option<String>,
    pub release_grade: Option<String>,
}

impl RunnerEnvironment {
    pub fn from_process_env() -> Self {
        Self {
            runner_mode: env::var(RUNNER_MODE_ENV).ok(),
            release_grade: env::var(RELEASE_GRADE_ENV).ok(),
        }
    }

    pub fn with_runner_mode(mut self, mode: &str) -> Self {
        self.runner_mode = Some(mode.to_string());
        self
    }

    pub fn with_release_grade(mut self, value: &str) -> Self {
        self.release_grade = Some(value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerProvenance {
    pub runner_mode: String,
    pub release_grade: bool,
}

impl RunnerProvenance {
    pub fn capture_active(&self) -> bool {
        self.runner_mode == SELF_HOSTED_EBPF_MODE
    }
}

/// Derives runner mode and release grade. An explicit, parseable
/// `RELEASE_GRADE` always wins over the mode-derived default.
pub fn resolve(env: &RunnerEnvironment) -> RunnerProvenance {
    let runner_mode = env
        .runner_mode
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(FALLBACK_RUNNER_MODE)
        .to_string();

    let derived = runner_mode == SELF_HOSTED_EBPF_MODE;
    let release_grade = match env.release_grade.as_deref().map(str::trim) {
        None | Some("") => derived,
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            warn!(
                value = raw,
                "ignoring unparseable {}; deriving from runner mode", RELEASE_GRADE_ENV
            );
            derived
        }),
    };

    RunnerProvenance {
        runner_mode,
        release_grade,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Synthetic,
    Fixture(PathBuf),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Synthetic => f.write_str("synthetic"),
            InputSource::Fixture(path) => write!(f, "fixture:{}", path.display()),
        }
    }
}

/// Contents of `provenance.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvenanceRecord {
    pub runner_mode: String,
    pub release_grade: bool,
    pub scenario: String,
    pub workload_profile: String,
    pub timestamp: String,
    pub input_source: String,
    pub generator: String,
    pub sample_count: usize,
    pub seed: Option<u64>,
    pub input_sha256: Option<String>,
    pub artifacts: Vec<String>,
}
