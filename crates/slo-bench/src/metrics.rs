use crate::error::BenchError;
use crate::evaluate::PredictionRecord;
use crate::provenance::RunnerProvenance;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Sparse (true_domain, predicted_domain) -> count table. Pairs never
/// observed are absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    cells: BTreeMap<(String, String), u64>,
}

impl ConfusionMatrix {
    pub fn record(&mut self, true_domain: &str, predicted_domain: &str) {
        *self
            .cells
            .entry((true_domain.to_string(), predicted_domain.to_string()))
            .or_default() += 1;
    }

    #[cfg(test)]
    pub(crate) fn count(&self, true_domain: &str, predicted_domain: &str) -> u64 {
        self.cells
            .get(&(true_domain.to_string(), predicted_domain.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Rows sorted by (true_domain, predicted_domain).
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.cells
            .iter()
            .map(|((t, p), c)| (t.as_str(), p.as_str(), *c))
    }

    #[cfg(test)]
    pub(crate) fn total(&self) -> u64 {
        self.cells.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainScore {
    pub precision: f64,
    pub recall: f64,
    pub support: u64,
}

/// Accuracy statistics before provenance is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionStats {
    pub sample_count: usize,
    pub accuracy: f64,
    pub mean_confidence: f64,
    pub per_domain: BTreeMap<String, DomainScore>,
}

/// Contents of `attribution_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionSummary {
    pub scenario: String,
    pub workload_profile: String,
    pub sample_count: usize,
    pub accuracy: f64,
    pub mean_confidence: f64,
    pub runner_mode: String,
    pub release_grade: bool,
    pub per_domain: BTreeMap<String, DomainScore>,
}

impl AttributionSummary {
    pub fn assemble(
        stats: AttributionStats,
        scenario: &str,
        workload_profile: &str,
        runner: &RunnerProvenance,
    ) -> Self {
        Self {
            scenario: scenario.to_string(),
            workload_profile: workload_profile.to_string(),
            sample_count: stats.sample_count,
            accuracy: stats.accuracy,
            mean_confidence: stats.mean_confidence,
            runner_mode: runner.runner_mode.clone(),
            release_grade: runner.release_grade,
            per_domain: stats.per_domain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverheadMetric {
    pub metric_name: String,
    pub value: f64,
    pub unit: String,
}

/// Run-level cost metrics, passed through to `collector_overhead.csv`
/// without threshold checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverheadRecord {
    pub metrics: Vec<OverheadMetric>,
}

impl OverheadRecord {
    fn push(&mut self, metric_name: &str, value: f64, unit: &str) {
        self.metrics.push(OverheadMetric {
            metric_name: metric_name.to_string(),
            value,
            unit: unit.to_string(),
        });
    }

    #[cfg(test)]
    pub(crate) fn get(&self, metric_name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.metric_name == metric_name)
            .map(|m| m.value)
    }
}

#[derive(Debug, Clone)]
pub struct OverheadInputs {
    pub elapsed: Duration,
    pub evidence_events: usize,
    pub capture_active: bool,
    pub events_per_second_limit: i64,
    /// Collector window each incident is captured over.
    pub capture_window_ms: i64,
    pub max_overhead_pct: f64,
}

pub fn aggregate(
    predictions: &[PredictionRecord],
    overhead: &OverheadInputs,
) -> Result<(ConfusionMatrix, AttributionStats, OverheadRecord), BenchError> {
    let mut matrix = ConfusionMatrix::default();
    let mut correct = 0usize;
    let mut confidence_sum = 0.0;
    let mut predicted_counts: BTreeMap<&str, u64> = BTreeMap::new();
    let mut actual_counts: BTreeMap<&str, u64> = BTreeMap::new();
    let mut hits: BTreeMap<&str, u64> = BTreeMap::new();

    for record in predictions {
        if record.true_fault_domains.is_empty() {
            return Err(BenchError::InvalidSample(record.sample_id.clone()));
        }
        let predicted = record.predicted_fault_domain.as_str();
        for truth in &record.true_fault_domains {
            matrix.record(truth, predicted);
            *actual_counts.entry(truth.as_str()).or_default() += 1;
        }
        *predicted_counts.entry(predicted).or_default() += 1;
        if record.is_correct() {
            correct += 1;
            *hits.entry(predicted).or_default() += 1;
        }
        confidence_sum += record.confidence;
    }

    let sample_count = predictions.len();
    let domains: BTreeSet<&str> = predicted_counts
        .keys()
        .chain(actual_counts.keys())
        .copied()
        .collect();
    let per_domain = domains
        .into_iter()
        .map(|domain| {
            let tp = hits.get(domain).copied().unwrap_or(0);
            let predicted = predicted_counts.get(domain).copied().unwrap_or(0);
            let support = actual_counts.get(domain).copied().unwrap_or(0);
            (
                domain.to_string(),
                DomainScore {
                    precision: ratio(tp, predicted),
                    recall: ratio(tp, support),
                    support,
                },
            )
        })
        .collect();

    let stats = AttributionStats {
        sample_count,
        accuracy: ratio(correct as u64, sample_count as u64),
        mean_confidence: if sample_count == 0 {
            0.0
        } else {
            confidence_sum / sample_count as f64
        },
        per_domain,
    };

    Ok((matrix, stats, overhead_record(sample_count, overhead)))
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn overhead_record(sample_count: usize, inputs: &OverheadInputs) -> OverheadRecord {
    let wall_ms = inputs.elapsed.as_secs_f64() * 1000.0;
    let secs = inputs.elapsed.as_secs_f64().max(1e-6);
    let dropped = dropped_events(sample_count, inputs);

    // Synthetic collector cost model: kernel capture pays per event, the
    // fallback path only pays for userspace sampling.
    let (base_cpu, per_event_cpu, added_latency_ms) = if inputs.capture_active {
        (1.2, 0.002, 0.85)
    } else {
        (0.3, 0.0005, 0.12)
    };
    let cpu_pct = base_cpu + per_event_cpu * inputs.evidence_events.min(1_000) as f64;

    let mut record = OverheadRecord::default();
    record.push("harness_wall_time_ms", round3(wall_ms), "ms");
    record.push(
        "samples_per_second",
        round3(sample_count as f64 / secs),
        "samples/s",
    );
    record.push("collector_cpu_pct", round3(cpu_pct), "percent");
    record.push("added_latency_p95_ms", added_latency_ms, "ms");
    record.push("evidence_events", inputs.evidence_events as f64, "events");
    record.push("dropped_events", dropped.round(), "events");
    record.push(
        "events_per_second_limit",
        inputs.events_per_second_limit as f64,
        "events/s",
    );
    record.push("max_overhead_pct", inputs.max_overhead_pct, "percent");
    record
}

/// Events beyond what the sampler admits: each incident gets one capture
/// window at `events_per_second_limit`.
fn dropped_events(sample_count: usize, inputs: &OverheadInputs) -> f64 {
    let window_secs = inputs.capture_window_ms.max(0) as f64 / 1000.0;
    let capacity = inputs.events_per_second_limit.max(0) as f64 * window_secs * sample_count as f64;
    (inputs.evidence_events as f64 - capacity).max(0.0)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, predicted: &str, truth: &[&str], confidence: f64) -> PredictionRecord {
        PredictionRecord {
            sample_id: id.to_string(),
            predicted_fault_domain: predicted.to_string(),
            true_fault_domains: truth.iter().map(|s| s.to_string()).collect(),
            confidence,
            deciding_signal: None,
        }
    }

    fn inputs() -> OverheadInputs {
        OverheadInputs {
            elapsed: Duration::from_millis(20),
            evidence_events: 40,
            capture_active: false,
            events_per_second_limit: 10_000,
            capture_window_ms: 2_000,
            max_overhead_pct: 5.0,
        }
    }

    #[test]
    fn multi_fault_samples_count_once_per_true_domain() {
        let predictions = vec![
            record("a", "provider_throttle", &["provider_throttle"], 0.8),
            record("b", "provider_throttle", &["provider_throttle", "network_dns"], 0.6),
            record("c", "network_dns", &["provider_throttle"], 0.4),
        ];
        let (matrix, stats, _) = aggregate(&predictions, &inputs()).expect("aggregate");
        assert_eq!(matrix.total(), 4);
        assert_eq!(matrix.count("provider_throttle", "provider_throttle"), 2);
        assert_eq!(matrix.count("network_dns", "provider_throttle"), 1);
        assert_eq!(matrix.count("provider_throttle", "network_dns"), 1);
        assert_eq!(matrix.count("network_dns", "network_dns"), 0);
        assert_eq!(matrix.rows().count(), 3, "matrix must stay sparse");
        assert_eq!(stats.sample_count, 3);
        assert!((stats.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats.mean_confidence - 0.6).abs() < 1e-12);

        let throttle = &stats.per_domain["provider_throttle"];
        assert_eq!(throttle.support, 3);
        assert!((throttle.precision - 1.0).abs() < 1e-12);
        assert!((throttle.recall - 2.0 / 3.0).abs() < 1e-12);
        let dns = &stats.per_domain["network_dns"];
        assert_eq!(dns.precision, 0.0);
        assert_eq!(dns.support, 1);
    }

    #[test]
    fn empty_truth_is_invalid_sample() {
        let predictions = vec![record("orphan", "network_dns", &[], 0.9)];
        match aggregate(&predictions, &inputs()) {
            Err(BenchError::InvalidSample(id)) => assert_eq!(id, "orphan"),
            other => panic!("expected InvalidSample, got {:?}", other),
        }
    }

    #[test]
    fn empty_run_has_zero_accuracy() {
        let (matrix, stats, _) = aggregate(&[], &inputs()).expect("aggregate");
        assert!(matrix.is_empty());
        assert_eq!(stats.accuracy, 0.0);
    }

    #[test]
    fn overhead_passes_config_limits_through() {
        let (_, _, overhead) = aggregate(&[], &inputs()).expect("aggregate");
        assert_eq!(overhead.get("events_per_second_limit"), Some(10_000.0));
        assert_eq!(overhead.get("max_overhead_pct"), Some(5.0));
        assert_eq!(overhead.get("dropped_events"), Some(0.0));
        assert!(overhead.get("harness_wall_time_ms").is_some());

        let capture = OverheadInputs {
            capture_active: true,
            ..inputs()
        };
        let (_, _, captured) = aggregate(&[], &capture).expect("aggregate");
        assert!(captured.get("collector_cpu_pct") > overhead.get("collector_cpu_pct"));
    }

    #[test]
    fn dropped_events_ignore_harness_speed() {
        let predictions: Vec<_> = (0..3)
            .map(|i| record(&format!("s-{}", i), "network_dns", &["network_dns"], 0.9))
            .collect();
        let fast = OverheadInputs {
            elapsed: Duration::from_micros(50),
            evidence_events: 30,
            ..inputs()
        };
        let (_, _, overhead) = aggregate(&predictions, &fast).expect("aggregate");
        assert_eq!(overhead.get("dropped_events"), Some(0.0));

        // 2 ev/s over a 1 s window admits 2 events per incident.
        let throttled = OverheadInputs {
            events_per_second_limit: 2,
            capture_window_ms: 1_000,
            ..fast
        };
        let (_, _, overhead) = aggregate(&predictions, &throttled).expect("aggregate");
        assert_eq!(overhead.get("dropped_events"), Some(24.0));
    }
}
