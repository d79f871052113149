//! Probe limits and deadlines.
//!
//! Every field has a default, so an empty TOML/JSON table deserialises to
//! [`ProbeConfig::default()`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits for all probes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub doh: DohConfig,
    pub availability: AvailabilityConfig,
    pub subdomains: SubdomainConfig,
    pub redirect: RedirectConfig,
    pub header_grading: HeaderGradingConfig,
    pub tls: TlsConfig,
    pub website_status: WebsiteStatusConfig,
    pub reverse_dns: ReverseDnsConfig,
    pub whois: WhoisConfig,
}

/// DNS-over-HTTPS propagation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DohConfig {
    pub query_timeout_secs: u64,
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 5,
        }
    }
}

impl DohConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Domain availability across TLDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    pub concurrency: usize,
    pub deadline_secs: u64,
    /// Return the TLDs checked so far instead of failing when the deadline fires.
    pub partial_results_on_timeout: bool,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            deadline_secs: 15,
            partial_results_on_timeout: false,
        }
    }
}

impl AvailabilityConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Subdomain enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdomainConfig {
    pub concurrency: usize,
    pub lookup_timeout_secs: u64,
    pub deadline_secs: u64,
    /// Return the labels resolved so far instead of failing when the deadline fires.
    pub partial_results_on_timeout: bool,
}

impl Default for SubdomainConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            lookup_timeout_secs: 5,
            deadline_secs: 30,
            partial_results_on_timeout: true,
        }
    }
}

impl SubdomainConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Redirect following, shared by the tracer and the header grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    pub max_hops: usize,
    pub detect_loops: bool,
    pub hop_timeout_secs: u64,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_hops: 20,
            detect_loops: true,
            hop_timeout_secs: 10,
        }
    }
}

impl RedirectConfig {
    pub fn hop_timeout(&self) -> Duration {
        Duration::from_secs(self.hop_timeout_secs)
    }
}

/// Redirect following for the header grader. Bounded by the hop cap alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderGradingConfig {
    pub max_hops: usize,
    pub hop_timeout_secs: u64,
}

impl Default for HeaderGradingConfig {
    fn default() -> Self {
        Self {
            max_hops: 10,
            hop_timeout_secs: 10,
        }
    }
}

impl HeaderGradingConfig {
    pub fn tracer_config(&self) -> RedirectConfig {
        RedirectConfig {
            max_hops: self.max_hops,
            detect_loops: false,
            hop_timeout_secs: self.hop_timeout_secs,
        }
    }
}

/// TLS certificate inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Deadline for TCP connect plus handshake.
    pub handshake_timeout_secs: u64,
    pub max_chain_depth: usize,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 10,
            max_chain_depth: 10,
        }
    }
}

impl TlsConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteStatusConfig {
    pub request_timeout_secs: u64,
}

impl Default for WebsiteStatusConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

impl WebsiteStatusConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseDnsConfig {
    pub timeout_secs: u64,
}

impl Default for ReverseDnsConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl ReverseDnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhoisConfig {
    pub timeout_secs: u64,
}

impl Default for WhoisConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl WhoisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
