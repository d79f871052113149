//! Network diagnostic probes for domains, URLs and IP addresses.
//!
//! DNS records, DNS-over-HTTPS propagation, TLD availability, subdomain
//! enumeration, redirect tracing, TLS certificates, security header grading,
//! reverse DNS, website liveness and WHOIS. Every probe is a short-lived
//! request/response call on [`ToolboxService`]; DNS and HTTP access go through
//! the [`DnsBackend`] and [`HttpFetcher`] traits so they can be replaced.

pub mod config;
mod error;
pub mod services;
#[cfg(test)]
mod test_utils;
mod types;

pub use config::{
    AvailabilityConfig, DohConfig, HeaderGradingConfig, ProbeConfig, RedirectConfig,
    ReverseDnsConfig, SubdomainConfig, TlsConfig, WebsiteStatusConfig, WhoisConfig,
};
pub use error::{ToolboxError, ToolboxResult};
pub use services::ToolboxService;
pub use services::fetch::{
    FetchError, FetchMethod, FetchRequest, FetchedResponse, HttpFetcher, ReqwestFetcher,
};
pub use services::resolver::{DnsBackend, HickoryBackend};
pub use services::runner::{BoundedRun, run_bounded, run_bounded_until};
pub use types::{
    AvailabilityReport, CertificateInfo, CertificateReport, DnsLookupReport,
    DnsPropagationReport, DnsQueryType, DnsRecord, DnsServerDescriptor, DnsTypeResult,
    DohServerResult, HttpHeader, HttpHeaderGradeReport, LookupFailure, NetworkErrorKind,
    PropagationStatus, RedirectHop, RedirectTraceReport, ReverseDnsHostname, ReverseDnsReport,
    SecurityCheck, SecurityGrade, SubdomainHit, SubdomainReport, TaskResult, TldAvailability,
    WebsiteStatusReport, WhoisResult,
};
