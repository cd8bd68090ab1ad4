use crate::domain::{is_latency_signal, template_for_signal, FaultDomain};
use crate::sample::Sample;
use crate::scenario::WorkloadShape;
use std::collections::BTreeSet;
use std::thread;

pub const UNKNOWN_DOMAIN: &str = "unknown";
pub const FAULT_LABEL_SIGNAL: &str = "fault_label";
const HINT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub sample_id: String,
    pub predicted_fault_domain: String,
    pub true_fault_domains: BTreeSet<String>,
    pub confidence: f64,
    /// Signal that decided the prediction, if any.
    pub deciding_signal: Option<String>,
}

impl PredictionRecord {
    pub fn is_correct(&self) -> bool {
        self.true_fault_domains.contains(&self.predicted_fault_domain)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    domain: FaultDomain,
    ratio: f64,
    signal: &'a str,
}

impl Candidate<'_> {
    fn beats(&self, other: &Candidate<'_>) -> bool {
        self.ratio > other.ratio
            || (self.ratio == other.ratio && self.domain.priority() < other.domain.priority())
    }
}

/// Attributes one sample to the domain whose template signal sits furthest
/// above its baseline. Equal ratios resolve by `FaultDomain` priority.
pub fn predict(sample: &Sample) -> PredictionRecord {
    let shape = WorkloadShape::for_profile(&sample.workload_profile);
    let mut best: Option<Candidate<'_>> = None;

    for ev in &sample.evidence {
        let Some((domain, template)) = template_for_signal(&ev.signal) else {
            continue;
        };
        let Some(value) = ev.value.as_f64() else {
            continue;
        };
        let baseline = if is_latency_signal(template.signal) {
            template.baseline * shape.latency_scale
        } else {
            template.baseline
        };
        let candidate = Candidate {
            domain,
            ratio: value / baseline,
            signal: template.signal,
        };
        if best.map_or(true, |b| candidate.beats(&b)) {
            best = Some(candidate);
        }
    }

    let (predicted, confidence, deciding_signal) = match best {
        Some(c) if c.ratio > 1.0 => (
            c.domain.as_str().to_string(),
            confidence_for_ratio(c.ratio),
            Some(c.signal.to_string()),
        ),
        _ => match fault_label_hint(sample) {
            Some(label) => (
                label.to_string(),
                HINT_CONFIDENCE,
                Some(FAULT_LABEL_SIGNAL.to_string()),
            ),
            None => (UNKNOWN_DOMAIN.to_string(), 0.0, None),
        },
    };

    PredictionRecord {
        sample_id: sample.id.clone(),
        predicted_fault_domain: predicted,
        true_fault_domains: sample.true_fault_domains.clone(),
        confidence,
        deciding_signal,
    }
}

fn fault_label_hint(sample: &Sample) -> Option<&str> {
    sample
        .evidence
        .iter()
        .filter(|ev| ev.signal == FAULT_LABEL_SIGNAL)
        .filter_map(|ev| ev.value.as_text())
        .find(|label| !label.is_empty())
}

/// Zero at the baseline, approaching one as the signal grows.
pub fn confidence_for_ratio(ratio: f64) -> f64 {
    if !ratio.is_finite() {
        return if ratio > 0.0 { 1.0 } else { 0.0 };
    }
    if ratio <= 1.0 {
        return 0.0;
    }
    (1.0 - 1.0 / ratio).clamp(0.0, 1.0)
}

/// Evaluates samples on up to `workers` scoped threads; results come back in
/// sample order.
pub fn predict_all(samples: &[Sample], workers: usize) -> Vec<PredictionRecord> {
    if workers <= 1 || samples.len() < 2 {
        return samples.iter().map(predict).collect();
    }
    let chunk_size = (samples.len() + workers - 1) / workers;
    thread::scope(|scope| {
        let handles: Vec<_> = samples
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(predict).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(records) => records,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
