use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a single harness invocation. Any error means the
/// output directory holds no usable artifact bundle.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("unsupported scenario: {0} (supported: provider_throttle, mixed_faults, mixed_multi)")]
    UnsupportedScenario(String),

    #[error("fixture {file}:{line}: {reason}", file = .path.display())]
    FixtureParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid sample {0}: no true fault domain")]
    InvalidSample(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode {artifact}: {source}")]
    Encode {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact bundle incomplete, missing or empty: {}", .0.join(", "))]
    WriteIncomplete(Vec<String>),
}
