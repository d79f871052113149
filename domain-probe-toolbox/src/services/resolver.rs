//! DNS resolution backend shared by the DNS-based probes.
//!
//! Probes talk to [`DnsBackend`] rather than to hickory directly so that
//! lookups can be replaced by in-memory answers in tests.

use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::{
    ResolveError, TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::{
        ProtoErrorKind,
        op::ResponseCode,
        rr::{RData, RecordType},
    },
};

use crate::types::{DnsQueryType, DnsRecord, LookupFailure, TaskResult};

/// DNS lookups used by the probes.
///
/// Implementations classify every failure into a [`LookupFailure`]; callers
/// never see transport errors.
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// Multi-answer lookup of one record type.
    ///
    /// An empty answer section is reported as [`LookupFailure::NotFound`].
    async fn lookup(&self, name: &str, record_type: DnsQueryType) -> TaskResult<Vec<DnsRecord>>;

    /// Single-answer SOA lookup.
    async fn lookup_soa(&self, name: &str) -> TaskResult<DnsRecord>;

    /// PTR lookup, hostnames without the trailing dot.
    async fn reverse(&self, ip: IpAddr) -> TaskResult<Vec<String>>;
}

/// [`DnsBackend`] backed by a hickory resolver using the host configuration.
pub struct HickoryBackend {
    resolver: TokioResolver,
}

impl HickoryBackend {
    /// Build a resolver from the host system configuration (e.g. `/etc/resolv.conf`).
    ///
    /// If the system configuration cannot be loaded, falls back to Hickory's
    /// default upstream set (Google Public DNS).
    pub fn system() -> Self {
        Self {
            resolver: build_system_resolver(),
        }
    }
}

impl Default for HickoryBackend {
    fn default() -> Self {
        Self::system()
    }
}

fn build_system_resolver() -> TokioResolver {
    #[cfg(any(unix, target_os = "windows"))]
    {
        match TokioResolver::builder_tokio() {
            Ok(builder) => return builder.build(),
            Err(e) => {
                log::warn!(
                    "[DNS] Failed to load system DNS configuration, falling back to defaults: {e}"
                );
            }
        }
    }

    TokioResolver::builder_with_config(
        ResolverConfig::default(),
        TokioConnectionProvider::default(),
    )
    .with_options(ResolverOpts::default())
    .build()
}

fn record_type_of(query: DnsQueryType) -> RecordType {
    match query {
        DnsQueryType::A => RecordType::A,
        DnsQueryType::Aaaa => RecordType::AAAA,
        DnsQueryType::Cname => RecordType::CNAME,
        DnsQueryType::Mx => RecordType::MX,
        DnsQueryType::Txt => RecordType::TXT,
        DnsQueryType::Ns => RecordType::NS,
        DnsQueryType::Soa => RecordType::SOA,
        DnsQueryType::Ptr => RecordType::PTR,
    }
}

/// Map a hickory error onto the probe failure taxonomy.
pub(crate) fn classify_resolve_error(err: &ResolveError) -> LookupFailure {
    if let Some(proto) = err.proto() {
        return match proto.kind() {
            ProtoErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
                ResponseCode::NoError | ResponseCode::NXDomain => LookupFailure::NotFound,
                _ => LookupFailure::ServerFailure,
            },
            ProtoErrorKind::Timeout => LookupFailure::Timeout,
            _ => LookupFailure::NetworkError,
        };
    }
    if err.is_nx_domain() || err.is_no_records_found() {
        return LookupFailure::NotFound;
    }
    LookupFailure::NetworkError
}

fn trim_name(name: &impl ToString) -> String {
    name.to_string().trim_end_matches('.').to_string()
}

/// Render one answer into a [`DnsRecord`] if it has the requested type.
///
/// CNAME chains in an A/AAAA answer are skipped this way.
fn to_record(data: &RData, ttl: u32, query: DnsQueryType) -> Option<DnsRecord> {
    let (value, priority) = match (query, data) {
        (DnsQueryType::A, RData::A(ip)) => (ip.to_string(), None),
        (DnsQueryType::Aaaa, RData::AAAA(ip)) => (ip.to_string(), None),
        (DnsQueryType::Cname, RData::CNAME(cname)) => (trim_name(&cname.0), None),
        (DnsQueryType::Mx, RData::MX(mx)) => (trim_name(mx.exchange()), Some(mx.preference())),
        (DnsQueryType::Txt, RData::TXT(txt)) => (
            txt.iter()
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect::<String>(),
            None,
        ),
        (DnsQueryType::Ns, RData::NS(ns)) => (trim_name(&ns.0), None),
        (DnsQueryType::Ptr, RData::PTR(ptr)) => (trim_name(&ptr.0), None),
        (DnsQueryType::Soa, RData::SOA(soa)) => (
            format!(
                "{} {} {} {} {} {} {}",
                trim_name(soa.mname()),
                trim_name(soa.rname()),
                soa.serial(),
                soa.refresh(),
                soa.retry(),
                soa.expire(),
                soa.minimum()
            ),
            None,
        ),
        _ => return None,
    };
    Some(DnsRecord {
        value,
        ttl,
        priority,
    })
}

#[async_trait]
impl DnsBackend for HickoryBackend {
    async fn lookup(&self, name: &str, record_type: DnsQueryType) -> TaskResult<Vec<DnsRecord>> {
        let response = self
            .resolver
            .lookup(name, record_type_of(record_type))
            .await
            .map_err(|e| {
                let failure = classify_resolve_error(&e);
                log::trace!("[DNS] {record_type} lookup for {name} failed ({failure}): {e}");
                failure
            })?;

        let records: Vec<DnsRecord> = response
            .record_iter()
            .filter_map(|record| to_record(record.data(), record.ttl(), record_type))
            .collect();

        if records.is_empty() {
            return Err(LookupFailure::NotFound);
        }
        Ok(records)
    }

    async fn lookup_soa(&self, name: &str) -> TaskResult<DnsRecord> {
        let response = self.resolver.soa_lookup(name).await.map_err(|e| {
            let failure = classify_resolve_error(&e);
            log::trace!("[DNS] SOA lookup for {name} failed ({failure}): {e}");
            failure
        })?;

        response
            .as_lookup()
            .record_iter()
            .find_map(|record| to_record(record.data(), record.ttl(), DnsQueryType::Soa))
            .ok_or(LookupFailure::NotFound)
    }

    async fn reverse(&self, ip: IpAddr) -> TaskResult<Vec<String>> {
        let response = self.resolver.reverse_lookup(ip).await.map_err(|e| {
            let failure = classify_resolve_error(&e);
            log::trace!("[DNS] PTR lookup for {ip} failed ({failure}): {e}");
            failure
        })?;

        Ok(response.iter().map(|ptr| trim_name(&ptr.0)).collect())
    }
}
