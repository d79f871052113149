//! Service façade exposing all probes.
//!
//! [`ToolboxService`] validates raw input, then hands it to the probe with the
//! configured limits and the injected DNS/HTTP backends.

pub mod availability;
pub mod dns;
pub mod dns_propagation;
pub mod fetch;
pub mod http_headers;
pub mod redirect;
pub mod resolver;
pub mod runner;
pub mod ssl;
pub mod subdomains;
pub mod validation;
pub mod website_status;
pub mod whois;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ProbeConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{
    AvailabilityReport, CertificateReport, DnsLookupReport, DnsPropagationReport, DnsQueryType,
    HttpHeaderGradeReport, RedirectTraceReport, ReverseDnsReport, SubdomainReport,
    WebsiteStatusReport, WhoisResult,
};

use fetch::{HttpFetcher, ReqwestFetcher};
use resolver::{DnsBackend, HickoryBackend};
use validation::{
    normalize_url, validate_bare_name, validate_domain, validate_ip, validate_root_domain,
};
use whois::WhoisClient;

/// Entry point for all probes.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and keeps no
/// per-call state.
///
/// ```rust,no_run
/// use domain_probe_toolbox::{ProbeConfig, ToolboxService};
/// # async fn demo() -> domain_probe_toolbox::ToolboxResult<()> {
/// let toolbox = ToolboxService::new(ProbeConfig::default())?;
/// let report = toolbox.dns_lookup("example.com").await?;
/// # Ok(())
/// # }
/// ```
pub struct ToolboxService {
    config: ProbeConfig,
    dns: Arc<dyn DnsBackend>,
    http: Arc<dyn HttpFetcher>,
    whois: WhoisClient,
}

impl ToolboxService {
    /// Service over the system resolver and a reqwest client.
    pub fn new(config: ProbeConfig) -> ToolboxResult<Self> {
        Self::with_backends(
            config,
            Arc::new(HickoryBackend::system()),
            Arc::new(ReqwestFetcher::new()?),
        )
    }

    /// Service over caller-supplied backends.
    pub fn with_backends(
        config: ProbeConfig,
        dns: Arc<dyn DnsBackend>,
        http: Arc<dyn HttpFetcher>,
    ) -> ToolboxResult<Self> {
        Ok(Self {
            config,
            dns,
            http,
            whois: WhoisClient::new()?,
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Resolve A, AAAA, CNAME, MX, TXT, NS and SOA records.
    ///
    /// Per-type failures are reported inside the result list.
    pub async fn dns_lookup(&self, domain: &str) -> ToolboxResult<DnsLookupReport> {
        let domain = validate_domain(domain)?;
        Ok(dns::dns_lookup(self.dns.as_ref(), &domain).await)
    }

    /// Compare answers from the public DoH resolvers.
    ///
    /// `record_type` defaults to `A`; `SOA` and `PTR` are rejected.
    pub async fn dns_propagation_check(
        &self,
        domain: &str,
        record_type: Option<&str>,
    ) -> ToolboxResult<DnsPropagationReport> {
        let domain = validate_domain(domain)?;
        let record_type = match record_type {
            Some(raw) => raw
                .trim()
                .parse::<DnsQueryType>()
                .map_err(ToolboxError::ValidationError)?,
            None => DnsQueryType::A,
        };
        dns_propagation::dns_propagation_check(
            self.http.as_ref(),
            &domain,
            record_type,
            &self.config.doh,
        )
        .await
    }

    /// Check a bare name (no dot) across the popular TLDs.
    pub async fn domain_availability(&self, name: &str) -> ToolboxResult<AvailabilityReport> {
        let name = validate_bare_name(name)?;
        availability::domain_availability(self.dns.as_ref(), &name, &self.config.availability)
            .await
    }

    /// Probe the built-in wordlist under `domain`. `cancel` stops the run early.
    pub async fn enumerate_subdomains(
        &self,
        domain: &str,
        cancel: Option<CancellationToken>,
    ) -> ToolboxResult<SubdomainReport> {
        let domain = validate_root_domain(domain)?;
        subdomains::enumerate_subdomains(
            self.dns.as_ref(),
            &domain,
            &self.config.subdomains,
            cancel,
        )
        .await
    }

    pub async fn trace_redirects(&self, url: &str) -> ToolboxResult<RedirectTraceReport> {
        let url = normalize_url(url)?;
        redirect::trace_redirects(self.http.as_ref(), &url, &self.config.redirect).await
    }

    /// Inspect the certificate served on port 443, trusted or not.
    pub async fn inspect_certificate(&self, domain: &str) -> ToolboxResult<CertificateReport> {
        let domain = validate_domain(domain)?;
        ssl::inspect_certificate(&domain, &self.config.tls).await
    }

    /// Grade the security headers of the final response after redirects.
    pub async fn http_header_check(&self, url: &str) -> ToolboxResult<HttpHeaderGradeReport> {
        let url = normalize_url(url)?;
        http_headers::http_header_check(self.http.as_ref(), &url, &self.config.header_grading)
            .await
    }

    pub async fn reverse_dns(&self, ip: &str) -> ToolboxResult<ReverseDnsReport> {
        let ip = validate_ip(ip)?;
        dns::reverse_dns(self.dns.as_ref(), ip, self.config.reverse_dns.timeout()).await
    }

    /// Liveness plus certificate validity. Reachability problems are part of
    /// the report, only bad input is an error.
    pub async fn website_status(&self, url: &str) -> ToolboxResult<WebsiteStatusReport> {
        let url = normalize_url(url)?;
        Ok(website_status::website_status(
            self.dns.as_ref(),
            self.http.as_ref(),
            &url,
            &self.config.website_status,
            &self.config.tls,
        )
        .await)
    }

    /// Query WHOIS and extract registration fields.
    pub async fn whois_lookup(&self, domain: &str) -> ToolboxResult<WhoisResult> {
        let domain = validate_domain(domain)?;
        self.whois.lookup(&domain, &self.config.whois).await
    }
}
