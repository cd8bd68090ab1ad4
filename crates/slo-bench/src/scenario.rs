use crate::domain::FaultDomain;
use crate::error::BenchError;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_WORKLOAD_PROFILE: &str = "rag_mixed";

/// Closed set of benchmark scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    ProviderThrottle,
    MixedFaults,
    MixedMulti,
}

/// How ground-truth labels are drawn for a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelPolicy {
    /// Every sample carries this one domain.
    Single(FaultDomain),
    /// Each sample carries one domain from the pool; the set as a whole covers
    /// every pool member.
    Mixture(&'static [FaultDomain]),
    /// Samples carry between one and `max_per_incident` simultaneous domains;
    /// at least one sample carries two or more.
    MultiFault {
        pool: &'static [FaultDomain],
        max_per_incident: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioPolicy {
    pub scenario: Scenario,
    pub labels: LabelPolicy,
    pub default_samples: usize,
    pub min_samples: usize,
}

const MIXED_FAULT_POOL: &[FaultDomain] = &[FaultDomain::NetworkDns, FaultDomain::ProviderThrottle];

const MULTI_FAULT_POOL: &[FaultDomain] = &[
    FaultDomain::ProviderThrottle,
    FaultDomain::NetworkDns,
    FaultDomain::NetworkTransport,
    FaultDomain::CpuContention,
];

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::ProviderThrottle,
        Scenario::MixedFaults,
        Scenario::MixedMulti,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::ProviderThrottle => "provider_throttle",
            Scenario::MixedFaults => "mixed_faults",
            Scenario::MixedMulti => "mixed_multi",
        }
    }

    pub fn policy(self) -> ScenarioPolicy {
        match self {
            Scenario::ProviderThrottle => ScenarioPolicy {
                scenario: self,
                labels: LabelPolicy::Single(FaultDomain::ProviderThrottle),
                default_samples: 24,
                min_samples: 1,
            },
            Scenario::MixedFaults => ScenarioPolicy {
                scenario: self,
                labels: LabelPolicy::Mixture(MIXED_FAULT_POOL),
                default_samples: 32,
                min_samples: MIXED_FAULT_POOL.len(),
            },
            Scenario::MixedMulti => ScenarioPolicy {
                scenario: self,
                labels: LabelPolicy::MultiFault {
                    pool: MULTI_FAULT_POOL,
                    max_per_incident: 3,
                },
                default_samples: 32,
                min_samples: 1,
            },
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| BenchError::UnsupportedScenario(s.to_string()))
    }
}

/// Resolves a scenario name to its generation policy.
pub fn resolve(name: &str) -> Result<ScenarioPolicy, BenchError> {
    Ok(name.trim().parse::<Scenario>()?.policy())
}

/// Signal shape of a named traffic mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadShape {
    pub name: String,
    /// Multiplier applied to latency baselines.
    pub latency_scale: f64,
    /// Background signals are drawn from `baseline * [low, high)`.
    pub noise_band: (f64, f64),
}

impl WorkloadShape {
    pub fn for_profile(name: &str) -> Self {
        let (latency_scale, noise_band) = match name {
            "rag_mixed" => (1.25, (0.55, 1.25)),
            "chat_stream" => (1.0, (0.6, 1.2)),
            "batch_embed" => (1.6, (0.5, 1.4)),
            _ => (1.0, (0.6, 1.2)),
        };
        Self {
            name: name.to_string(),
            latency_scale,
            noise_band,
        }
    }
}
