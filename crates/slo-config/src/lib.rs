use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const API_VERSION: &str = "toolkit.llm-slo.dev/v1alpha1";
pub const KIND: &str = "ToolkitConfig";

/// Mirrors `config/toolkit.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub signal_set: Vec<String>,
    pub sampling: SamplingConfig,
    pub correlation: CorrelationConfig,
    pub otlp: OtlpConfig,
    pub safety: SafetyConfig,
    pub webhook: WebhookConfig,
    pub cdgate: CdGateConfig,
}

/// Event-rate limiting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub events_per_second_limit: i64,
    pub burst_limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub window_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtlpConfig {
    pub endpoint: String,
}

/// Runtime overhead limits consumed by the safety gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_overhead_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub secret: String,
    pub format: String,
    pub timeout_ms: i64,
}

/// CD SLO gate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdGateConfig {
    pub enabled: bool,
    pub prometheus_url: String,
    pub ttft_p95_ms: f64,
    pub error_rate: f64,
    pub burn_rate: f64,
    pub fail_open: bool,
}

impl Default for CdGateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prometheus_url: "http://prometheus:9090".to_string(),
            ttft_p95_ms: 800.0,
            error_rate: 0.05,
            burn_rate: 2.0,
            fail_open: true,
        }
    }
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            signal_set: DEFAULT_SIGNAL_SET.iter().map(|s| s.to_string()).collect(),
            sampling: SamplingConfig {
                events_per_second_limit: 10_000,
                burst_limit: 20_000,
            },
            correlation: CorrelationConfig { window_ms: 2_000 },
            otlp: OtlpConfig {
                endpoint: "http://otel-collector:4317".to_string(),
            },
            safety: SafetyConfig {
                max_overhead_pct: 5.0,
            },
            webhook: WebhookConfig {
                enabled: false,
                url: String::new(),
                secret: String::new(),
                format: "generic".to_string(),
                timeout_ms: 5_000,
            },
            cdgate: CdGateConfig::default(),
        }
    }
}

pub const DEFAULT_SIGNAL_SET: [&str; 9] = [
    "dns_latency_ms",
    "tcp_retransmits_total",
    "runqueue_delay_ms",
    "connect_latency_ms",
    "tls_handshake_ms",
    "cpu_steal_pct",
    "mem_reclaim_latency_ms",
    "disk_io_latency_ms",
    "syscall_latency_ms",
];

impl ToolkitConfig {
    pub fn has_signal(&self, signal: &str) -> bool {
        self.signal_set.iter().any(|s| s == signal)
    }
}

/// Parses a toolkit config file and fills every unset or non-positive field
/// from the defaults.
pub fn load(path: &Path) -> Result<ToolkitConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let mut cfg = parse(&raw).with_context(|| format!("unmarshal config {}", path.display()))?;
    normalize(&mut cfg);
    Ok(cfg)
}

fn parse(raw: &str) -> Result<ToolkitConfig> {
    if raw.trim().is_empty() {
        return Ok(ToolkitConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

pub fn normalize(cfg: &mut ToolkitConfig) {
    let defaults = ToolkitConfig::default();

    if cfg.signal_set.is_empty() {
        cfg.signal_set = defaults.signal_set;
    }
    if cfg.sampling.events_per_second_limit <= 0 {
        cfg.sampling.events_per_second_limit = defaults.sampling.events_per_second_limit;
    }
    if cfg.sampling.burst_limit <= 0 {
        cfg.sampling.burst_limit = defaults.sampling.burst_limit;
    }
    if cfg.correlation.window_ms <= 0 {
        cfg.correlation.window_ms = defaults.correlation.window_ms;
    }
    if cfg.otlp.endpoint.is_empty() {
        cfg.otlp.endpoint = defaults.otlp.endpoint;
    }
    if cfg.safety.max_overhead_pct <= 0.0 {
        cfg.safety.max_overhead_pct = defaults.safety.max_overhead_pct;
    }
    if cfg.webhook.format.is_empty() {
        cfg.webhook.format = defaults.webhook.format;
    }
    if cfg.webhook.timeout_ms <= 0 {
        cfg.webhook.timeout_ms = defaults.webhook.timeout_ms;
    }
    if cfg.cdgate.prometheus_url.is_empty() {
        cfg.cdgate.prometheus_url = defaults.cdgate.prometheus_url;
    }
    if cfg.cdgate.ttft_p95_ms <= 0.0 {
        cfg.cdgate.ttft_p95_ms = defaults.cdgate.ttft_p95_ms;
    }
    if cfg.cdgate.error_rate <= 0.0 {
        cfg.cdgate.error_rate = defaults.cdgate.error_rate;
    }
    if cfg.cdgate.burn_rate <= 0.0 {
        cfg.cdgate.burn_rate = defaults.cdgate.burn_rate;
    }
    if cfg.api_version.is_empty() {
        cfg.api_version = defaults.api_version;
    }
    if cfg.kind.is_empty() {
        cfg.kind = defaults.kind;
    }
}
