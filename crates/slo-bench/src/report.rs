use crate::evaluate::PredictionRecord;
use crate::metrics::{AttributionSummary, ConfusionMatrix, OverheadRecord};
use crate::provenance::ProvenanceRecord;
use std::fmt::Write;

const MAX_MISSES_LISTED: usize = 10;

pub fn render_report(
    summary: &AttributionSummary,
    matrix: &ConfusionMatrix,
    predictions: &[PredictionRecord],
    overhead: &OverheadRecord,
    provenance: &ProvenanceRecord,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Incident Attribution Benchmark: {}", summary.scenario);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} incidents from the `{}` workload were attributed with **{:.1}%** accuracy \
         (mean confidence {:.2}).",
        summary.sample_count,
        summary.workload_profile,
        summary.accuracy * 100.0,
        summary.mean_confidence
    );
    let _ = writeln!(out);
    let grade = if summary.release_grade {
        "release grade"
    } else {
        "not release grade"
    };
    let _ = writeln!(
        out,
        "Runner mode `{}` ({}); input `{}`; generated {}.",
        summary.runner_mode, grade, provenance.input_source, provenance.timestamp
    );
    if let Some(seed) = provenance.seed {
        let _ = writeln!(out, "Synthetic seed: `{}`.", seed);
    }
    if let Some(sha) = &provenance.input_sha256 {
        let _ = writeln!(out, "Fixture sha256: `{}`.", sha);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Confusion matrix");
    let _ = writeln!(out);
    let _ = writeln!(out, "| true domain | predicted domain | count |");
    let _ = writeln!(out, "|---|---|---|");
    for (t, p, count) in matrix.rows() {
        let _ = writeln!(out, "| {} | {} | {} |", t, p, count);
    }

    if !summary.per_domain.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Per-domain scores");
        let _ = writeln!(out);
        let _ = writeln!(out, "| domain | precision | recall | support |");
        let _ = writeln!(out, "|---|---|---|---|");
        for (domain, score) in &summary.per_domain {
            let _ = writeln!(
                out,
                "| {} | {:.3} | {:.3} | {} |",
                domain, score.precision, score.recall, score.support
            );
        }
    }

    let misses: Vec<&PredictionRecord> = predictions.iter().filter(|r| !r.is_correct()).collect();
    let _ = writeln!(out);
    let _ = writeln!(out, "## Misattributions");
    let _ = writeln!(out);
    if misses.is_empty() {
        let _ = writeln!(out, "None.");
    } else {
        for miss in misses.iter().take(MAX_MISSES_LISTED) {
            let _ = write!(
                out,
                "- `{}`: predicted `{}`, expected `{}`",
                miss.sample_id,
                miss.predicted_fault_domain,
                join_domains(&miss.true_fault_domains)
            );
            match &miss.deciding_signal {
                Some(signal) => {
                    let _ = writeln!(out, " (decided by `{}`)", signal);
                }
                None => {
                    let _ = writeln!(out, " (no anomalous signal)");
                }
            }
        }
        if misses.len() > MAX_MISSES_LISTED {
            let _ = writeln!(out, "- ... and {} more", misses.len() - MAX_MISSES_LISTED);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Collector overhead");
    let _ = writeln!(out);
    let _ = writeln!(out, "| metric | value | unit |");
    let _ = writeln!(out, "|---|---|---|");
    for m in &overhead.metrics {
        let _ = writeln!(out, "| {} | {} | {} |", m.metric_name, m.value, m.unit);
    }
    out
}

pub fn join_domains<'a>(domains: impl IntoIterator<Item = &'a String>) -> String {
    domains
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";")
}
