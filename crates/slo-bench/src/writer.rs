use crate::error::BenchError;
use crate::evaluate::PredictionRecord;
use crate::metrics::{AttributionSummary, ConfusionMatrix, OverheadRecord};
use crate::provenance::ProvenanceRecord;
use crate::report::{join_domains, render_report};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ATTRIBUTION_SUMMARY: &str = "attribution_summary.json";
pub const CONFUSION_MATRIX: &str = "confusion-matrix.csv";
pub const INCIDENT_PREDICTIONS: &str = "incident_predictions.csv";
pub const COLLECTOR_OVERHEAD: &str = "collector_overhead.csv";
pub const PROVENANCE: &str = "provenance.json";
pub const REPORT: &str = "report.md";

pub const ARTIFACT_NAMES: [&str; 6] = [
    ATTRIBUTION_SUMMARY,
    CONFUSION_MATRIX,
    INCIDENT_PREDICTIONS,
    COLLECTOR_OVERHEAD,
    PROVENANCE,
    REPORT,
];

pub struct ArtifactBundle<'a> {
    pub matrix: &'a ConfusionMatrix,
    pub predictions: &'a [PredictionRecord],
    pub summary: &'a AttributionSummary,
    pub overhead: &'a OverheadRecord,
    pub provenance: &'a ProvenanceRecord,
}

/// Writes all six artifacts into `out_dir`. Returns only once every artifact
/// exists and is non-empty; files written before a failure are left behind.
pub fn write_artifacts(out_dir: &Path, bundle: &ArtifactBundle<'_>) -> Result<Vec<PathBuf>, BenchError> {
    fs::create_dir_all(out_dir)?;

    let encoded: [(&str, Vec<u8>); 6] = [
        (ATTRIBUTION_SUMMARY, encode_json(ATTRIBUTION_SUMMARY, bundle.summary)?),
        (CONFUSION_MATRIX, confusion_csv(bundle.matrix).into_bytes()),
        (INCIDENT_PREDICTIONS, predictions_csv(bundle.predictions).into_bytes()),
        (COLLECTOR_OVERHEAD, overhead_csv(bundle.overhead).into_bytes()),
        (PROVENANCE, encode_json(PROVENANCE, bundle.provenance)?),
        (
            REPORT,
            render_report(
                bundle.summary,
                bundle.matrix,
                bundle.predictions,
                bundle.overhead,
                bundle.provenance,
            )
            .into_bytes(),
        ),
    ];

    let mut written = Vec::with_capacity(encoded.len());
    for (name, bytes) in encoded.iter() {
        let path = out_dir.join(name);
        atomic_write_bytes(&path, bytes)?;
        debug!(artifact = *name, bytes = bytes.len(), "wrote artifact");
        written.push(path);
    }

    verify_bundle(out_dir)?;
    Ok(written)
}

/// Fails with `WriteIncomplete` naming every required artifact that is
/// missing or empty.
pub fn verify_bundle(out_dir: &Path) -> Result<(), BenchError> {
    let missing: Vec<String> = ARTIFACT_NAMES
        .iter()
        .filter(|name| {
            fs::metadata(out_dir.join(name))
                .map(|m| !m.is_file() || m.len() == 0)
                .unwrap_or(true)
        })
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BenchError::WriteIncomplete(missing))
    }
}

fn encode_json<T: Serialize>(artifact: &'static str, value: &T) -> Result<Vec<u8>, BenchError> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| BenchError::Encode { artifact, source })?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<(), BenchError> {
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn csv_line(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn confusion_csv(matrix: &ConfusionMatrix) -> String {
    let mut out = csv_line(&["true_domain", "predicted_domain", "count"]);
    for (t, p, count) in matrix.rows() {
        out.push_str(&csv_line(&[t, p, count.to_string().as_str()]));
    }
    out
}

fn predictions_csv(predictions: &[PredictionRecord]) -> String {
    let mut out = csv_line(&[
        "sample_id",
        "true_fault_domains",
        "predicted_fault_domain",
        "confidence",
    ]);
    for record in predictions {
        out.push_str(&csv_line(&[
            record.sample_id.as_str(),
            join_domains(&record.true_fault_domains).as_str(),
            record.predicted_fault_domain.as_str(),
            format!("{:.4}", record.confidence).as_str(),
        ]));
    }
    out
}

fn overhead_csv(overhead: &OverheadRecord) -> String {
    let mut out = csv_line(&["metric_name", "value", "unit"]);
    for m in &overhead.metrics {
        out.push_str(&csv_line(&[
            m.metric_name.as_str(),
            m.value.to_string().as_str(),
            m.unit.as_str(),
        ]));
    }
    out
}
