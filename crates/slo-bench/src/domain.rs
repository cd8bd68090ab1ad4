use std::fmt;

/// Root-cause categories the evaluator can attribute an incident to.
///
/// Declaration order is the tie-break priority: when two domains are equally
/// anomalous the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaultDomain {
    ProviderThrottle,
    NetworkDns,
    NetworkTransport,
    CpuContention,
    MemoryPressure,
    IoLatency,
}

/// A signal whose elevation is characteristic of one fault domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTemplate {
    pub signal: &'static str,
    pub baseline: f64,
    pub source: &'static str,
}

const PROVIDER_THROTTLE: &[SignalTemplate] = &[
    SignalTemplate {
        signal: "provider_latency_ms",
        baseline: 350.0,
        source: "application",
    },
    SignalTemplate {
        signal: "http_429_rate",
        baseline: 0.02,
        source: "application",
    },
];

const NETWORK_DNS: &[SignalTemplate] = &[SignalTemplate {
    signal: "dns_latency_ms",
    baseline: 20.0,
    source: "ebpf",
}];

const NETWORK_TRANSPORT: &[SignalTemplate] = &[
    SignalTemplate {
        signal: "tcp_retransmits_total",
        baseline: 4.0,
        source: "ebpf",
    },
    SignalTemplate {
        signal: "connect_latency_ms",
        baseline: 15.0,
        source: "ebpf",
    },
    SignalTemplate {
        signal: "tls_handshake_ms",
        baseline: 30.0,
        source: "ebpf",
    },
];

const CPU_CONTENTION: &[SignalTemplate] = &[
    SignalTemplate {
        signal: "runqueue_delay_ms",
        baseline: 2.0,
        source: "ebpf",
    },
    SignalTemplate {
        signal: "cpu_steal_pct",
        baseline: 1.5,
        source: "procfs",
    },
];

const MEMORY_PRESSURE: &[SignalTemplate] = &[SignalTemplate {
    signal: "mem_reclaim_latency_ms",
    baseline: 5.0,
    source: "ebpf",
}];

const IO_LATENCY: &[SignalTemplate] = &[
    SignalTemplate {
        signal: "disk_io_latency_ms",
        baseline: 8.0,
        source: "ebpf",
    },
    SignalTemplate {
        signal: "syscall_latency_ms",
        baseline: 0.5,
        source: "ebpf",
    },
];

impl FaultDomain {
    /// All domains in tie-break priority order.
    pub const ALL: [FaultDomain; 6] = [
        FaultDomain::ProviderThrottle,
        FaultDomain::NetworkDns,
        FaultDomain::NetworkTransport,
        FaultDomain::CpuContention,
        FaultDomain::MemoryPressure,
        FaultDomain::IoLatency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FaultDomain::ProviderThrottle => "provider_throttle",
            FaultDomain::NetworkDns => "network_dns",
            FaultDomain::NetworkTransport => "network_transport",
            FaultDomain::CpuContention => "cpu_contention",
            FaultDomain::MemoryPressure => "memory_pressure",
            FaultDomain::IoLatency => "io_latency",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }

    pub fn priority(self) -> usize {
        self as usize
    }

    pub fn templates(self) -> &'static [SignalTemplate] {
        match self {
            FaultDomain::ProviderThrottle => PROVIDER_THROTTLE,
            FaultDomain::NetworkDns => NETWORK_DNS,
            FaultDomain::NetworkTransport => NETWORK_TRANSPORT,
            FaultDomain::CpuContention => CPU_CONTENTION,
            FaultDomain::MemoryPressure => MEMORY_PRESSURE,
            FaultDomain::IoLatency => IO_LATENCY,
        }
    }
}

impl fmt::Display for FaultDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Looks up which domain owns `signal`.
pub fn template_for_signal(signal: &str) -> Option<(FaultDomain, &'static SignalTemplate)> {
    FaultDomain::ALL.into_iter().find_map(|domain| {
        domain
            .templates()
            .iter()
            .find(|t| t.signal == signal)
            .map(|t| (domain, t))
    })
}

pub fn is_latency_signal(signal: &str) -> bool {
    signal.ends_with("_ms")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn signals_belong_to_exactly_one_domain() {
        let mut seen = BTreeSet::new();
        for domain in FaultDomain::ALL {
            for t in domain.templates() {
                assert!(seen.insert(t.signal), "duplicate signal {}", t.signal);
                assert!(t.baseline > 0.0);
            }
        }
    }

    #[test]
    fn parse_round_trips_names() {
        for domain in FaultDomain::ALL {
            assert_eq!(FaultDomain::parse(domain.as_str()), Some(domain));
        }
        assert_eq!(FaultDomain::parse("cosmic_rays"), None);
    }

    #[test]
    fn template_lookup_finds_owner() {
        let (domain, t) = template_for_signal("dns_latency_ms").expect("dns template");
        assert_eq!(domain, FaultDomain::NetworkDns);
        assert_eq!(t.baseline, 20.0);
        assert!(template_for_signal("fault_label").is_none());
    }
}
