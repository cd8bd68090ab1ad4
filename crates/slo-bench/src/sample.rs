use crate::domain::{is_latency_signal, FaultDomain};
use crate::error::BenchError;
use crate::scenario::{LabelPolicy, ScenarioPolicy, WorkloadShape};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use slo_config::ToolkitConfig;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Elevated template signals are drawn from `baseline * [low, high)`.
const FAULT_MAGNITUDE: (f64, f64) = (3.0, 8.0);

/// A labeled incident. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub scenario: String,
    pub workload_profile: String,
    pub true_fault_domains: BTreeSet<String>,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub signal: String,
    pub value: EvidenceValue,
    #[serde(default)]
    pub source: String,
}

/// Signal readings are numeric, but collectors and hand-written fixtures also
/// carry labels such as `fault_label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceValue {
    Number(f64),
    Text(String),
}

impl EvidenceValue {
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            EvidenceValue::Number(v) => *v,
            EvidenceValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EvidenceValue::Text(s) => Some(s.trim()),
            EvidenceValue::Number(_) => None,
        }
    }
}

/// Generates `count` labeled samples for `policy`, never fewer than the
/// policy's minimum. Label coverage holds for every seed; evidence magnitudes
/// vary with it.
pub fn synthesize(
    policy: &ScenarioPolicy,
    workload_profile: &str,
    count: usize,
    seed: u64,
    config: &ToolkitConfig,
) -> Vec<Sample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let shape = WorkloadShape::for_profile(workload_profile);
    let count = count.max(policy.min_samples);
    let scenario = policy.scenario.name();

    (0..count)
        .map(|idx| {
            let labels = draw_labels(&policy.labels, idx, &mut rng);
            let evidence = synthesize_evidence(&labels, &shape, config, &mut rng);
            Sample {
                id: format!("{}-{:04}", scenario, idx + 1),
                scenario: scenario.to_string(),
                workload_profile: workload_profile.to_string(),
                true_fault_domains: labels.iter().map(|d| d.as_str().to_string()).collect(),
                evidence,
            }
        })
        .collect()
}

fn draw_labels(policy: &LabelPolicy, idx: usize, rng: &mut ChaCha8Rng) -> BTreeSet<FaultDomain> {
    match policy {
        LabelPolicy::Single(domain) => BTreeSet::from([*domain]),
        LabelPolicy::Mixture(pool) => {
            let domain = if idx < pool.len() {
                pool[idx]
            } else {
                *pool.choose(rng).unwrap_or(&FaultDomain::ProviderThrottle)
            };
            BTreeSet::from([domain])
        }
        LabelPolicy::MultiFault {
            pool,
            max_per_incident,
        } => {
            let upper = (*max_per_incident).clamp(1, pool.len());
            let k = if idx == 0 {
                2.min(upper)
            } else {
                rng.gen_range(1..=upper)
            };
            if idx == 0 {
                pool.iter().take(k).copied().collect()
            } else {
                pool.choose_multiple(rng, k).copied().collect()
            }
        }
    }
}

fn synthesize_evidence(
    labels: &BTreeSet<FaultDomain>,
    shape: &WorkloadShape,
    config: &ToolkitConfig,
    rng: &mut ChaCha8Rng,
) -> Vec<Evidence> {
    let mut evidence = Vec::new();
    for domain in FaultDomain::ALL {
        let faulted = labels.contains(&domain);
        for template in domain.templates() {
            let collected = template.source == "application" || config.has_signal(template.signal);
            if !faulted && !collected {
                continue;
            }
            let (low, high) = if faulted {
                FAULT_MAGNITUDE
            } else {
                shape.noise_band
            };
            let scale = if is_latency_signal(template.signal) {
                shape.latency_scale
            } else {
                1.0
            };
            let value = template.baseline * scale * rng.gen_range(low..high);
            evidence.push(Evidence {
                signal: template.signal.to_string(),
                value: EvidenceValue::Number(round3(value)),
                source: template.source.to_string(),
            });
        }
    }
    evidence
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Parsed fixture plus the digest of its raw bytes.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub path: PathBuf,
    pub samples: Vec<Sample>,
    pub sha256: String,
}

#[derive(Debug, Deserialize)]
struct FixtureLine {
    id: String,
    true_fault_domains: BTreeSet<String>,
    evidence: Vec<Evidence>,
    #[serde(default)]
    scenario: Option<String>,
    #[serde(default)]
    workload_profile: Option<String>,
}

/// Reads newline-delimited JSON samples. Blank lines are skipped; every other
/// line becomes exactly one sample, in file order.
pub fn load_fixture(path: &Path, scenario: &str, workload_profile: &str) -> Result<Fixture, BenchError> {
    let bytes = fs::read(path)?;
    let text = std::str::from_utf8(&bytes).map_err(|e| BenchError::FixtureParse {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("not utf-8: {}", e),
    })?;

    let mut samples = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: FixtureLine =
            serde_json::from_str(line).map_err(|e| BenchError::FixtureParse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: e.to_string(),
            })?;
        if parsed.id.trim().is_empty() {
            return Err(BenchError::FixtureParse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "empty id".to_string(),
            });
        }
        samples.push(Sample {
            id: parsed.id,
            scenario: parsed.scenario.unwrap_or_else(|| scenario.to_string()),
            workload_profile: parsed
                .workload_profile
                .unwrap_or_else(|| workload_profile.to_string()),
            true_fault_domains: parsed.true_fault_domains,
            evidence: parsed.evidence,
        });
    }

    Ok(Fixture {
        path: path.to_path_buf(),
        samples,
        sha256: hex::encode(Sha256::digest(&bytes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;

    fn temp_fixture(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "slo_bench_fixture_{}_{}_{}",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("samples.jsonl");
        fs::write(&path, content).expect("write fixture");
        (dir, path)
    }

    #[test]
    fn mixed_faults_covers_both_domains_for_any_seed() {
        let policy = Scenario::MixedFaults.policy();
        for seed in 0..16 {
            let samples = synthesize(&policy, "rag_mixed", 2, seed, &ToolkitConfig::default());
            let domains: BTreeSet<&str> = samples
                .iter()
                .flat_map(|s| s.true_fault_domains.iter().map(|d| d.as_str()))
                .collect();
            assert!(domains.contains("network_dns"), "seed {}", seed);
            assert!(domains.contains("provider_throttle"), "seed {}", seed);
            assert!(samples.iter().all(|s| s.true_fault_domains.len() == 1));
        }
    }

    #[test]
    fn mixed_multi_always_has_a_multi_domain_sample() {
        let policy = Scenario::MixedMulti.policy();
        for seed in 0..16 {
            let samples = synthesize(&policy, "rag_mixed", 1, seed, &ToolkitConfig::default());
            assert!(samples.iter().any(|s| s.true_fault_domains.len() >= 2));
            assert!(samples.iter().all(|s| !s.true_fault_domains.is_empty()));
        }
    }

    #[test]
    fn count_is_raised_to_policy_minimum() {
        let policy = Scenario::MixedFaults.policy();
        let samples = synthesize(&policy, "rag_mixed", 0, 7, &ToolkitConfig::default());
        assert_eq!(samples.len(), policy.min_samples);
    }

    #[test]
    fn same_seed_reproduces_samples() {
        let policy = Scenario::MixedMulti.policy();
        let cfg = ToolkitConfig::default();
        let a = synthesize(&policy, "chat_stream", 12, 99, &cfg);
        let b = synthesize(&policy, "chat_stream", 12, 99, &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn background_signals_follow_signal_set() {
        let mut cfg = ToolkitConfig::default();
        cfg.signal_set = vec!["dns_latency_ms".to_string()];
        let policy = Scenario::ProviderThrottle.policy();
        let samples = synthesize(&policy, "rag_mixed", 3, 1, &cfg);
        for sample in samples {
            let signals: BTreeSet<&str> = sample.evidence.iter().map(|e| e.signal.as_str()).collect();
            assert!(signals.contains("provider_latency_ms"));
            assert!(signals.contains("dns_latency_ms"));
            assert!(!signals.contains("disk_io_latency_ms"));
        }
    }

    #[test]
    fn fixture_lines_map_one_to_one() {
        let (dir, path) = temp_fixture(
            "ok",
            concat!(
                r#"{"id":"a","true_fault_domains":["network_dns"],"evidence":[{"signal":"dns_latency_ms","value":180,"source":"ebpf"}]}"#,
                "\n\n",
                r#"{"id":"b","true_fault_domains":["provider_throttle","network_dns"],"evidence":[{"signal":"fault_label","value":"provider_throttle","source":"application"}],"workload_profile":"chat_stream"}"#,
                "\n"
            ),
        );
        let fixture = load_fixture(&path, "provider_throttle", "rag_mixed").expect("fixture");
        assert_eq!(fixture.samples.len(), 2);
        assert_eq!(fixture.samples[0].id, "a");
        assert_eq!(fixture.samples[0].workload_profile, "rag_mixed");
        assert_eq!(fixture.samples[1].workload_profile, "chat_stream");
        assert_eq!(fixture.samples[1].true_fault_domains.len(), 2);
        assert_eq!(fixture.sha256.len(), 64);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_fixture_line_reports_line_number() {
        let (dir, path) = temp_fixture(
            "bad",
            concat!(
                r#"{"id":"a","true_fault_domains":["network_dns"],"evidence":[]}"#,
                "\n",
                "{not json\n"
            ),
        );
        match load_fixture(&path, "provider_throttle", "rag_mixed") {
            Err(BenchError::FixtureParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected FixtureParse, got {:?}", other),
        }
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn numeric_text_evidence_parses() {
        assert_eq!(EvidenceValue::Text(" 42.5 ".to_string()).as_f64(), Some(42.5));
        assert_eq!(EvidenceValue::Text("provider_throttle".to_string()).as_f64(), None);
        assert_eq!(EvidenceValue::Number(f64::NAN).as_f64(), None);
    }
}
