//! DNS record lookup and reverse DNS.

use std::net::IpAddr;

use futures::future::join_all;
use log::{debug, warn};
use tokio::time::{Duration, timeout};

use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{
    DnsLookupReport, DnsQueryType, DnsRecord, DnsTypeResult, LookupFailure, ReverseDnsHostname,
    ReverseDnsReport, TaskResult,
};

use super::resolver::DnsBackend;

fn type_result(record_type: DnsQueryType, result: TaskResult<Vec<DnsRecord>>) -> DnsTypeResult {
    match result {
        Ok(records) => DnsTypeResult {
            record_type,
            records,
            error: None,
        },
        Err(failure) => DnsTypeResult {
            record_type,
            records: Vec::new(),
            error: Some(failure),
        },
    }
}

/// Resolve A, AAAA, CNAME, MX, TXT, NS and SOA concurrently.
///
/// Never fails for a valid domain: a type whose lookup fails is reported
/// with no records and the failure tag.
pub async fn dns_lookup(backend: &dyn DnsBackend, domain: &str) -> DnsLookupReport {
    debug!("[DNS] Looking up all record types for {domain}");

    let multi = DnsQueryType::LOOKUP_TYPES
        .iter()
        .copied()
        .filter(|t| *t != DnsQueryType::Soa)
        .map(|record_type| async move {
            type_result(record_type, backend.lookup(domain, record_type).await)
        });

    let (mut results, soa) = tokio::join!(join_all(multi), backend.lookup_soa(domain));
    results.push(type_result(DnsQueryType::Soa, soa.map(|record| vec![record])));

    debug!(
        "[DNS] Lookup for {domain} done: {} type(s) with records",
        results.iter().filter(|r| !r.records.is_empty()).count()
    );

    DnsLookupReport {
        domain: domain.to_string(),
        results,
    }
}

/// PTR lookup with forward confirmation of every hostname.
///
/// The whole operation, including forward lookups, is bounded by `limit`.
pub async fn reverse_dns(
    backend: &dyn DnsBackend,
    ip: IpAddr,
    limit: Duration,
) -> ToolboxResult<ReverseDnsReport> {
    timeout(limit, reverse_dns_inner(backend, ip))
        .await
        .map_err(|_| {
            warn!("[DNS] Reverse lookup for {ip} timed out");
            ToolboxError::Timeout(format!(
                "Reverse DNS lookup timed out ({}s)",
                limit.as_secs()
            ))
        })?
}

async fn reverse_dns_inner(
    backend: &dyn DnsBackend,
    ip: IpAddr,
) -> ToolboxResult<ReverseDnsReport> {
    let names = match backend.reverse(ip).await {
        Ok(names) => names,
        Err(LookupFailure::NotFound) => Vec::new(),
        Err(LookupFailure::Timeout) => {
            return Err(ToolboxError::Timeout(format!(
                "PTR lookup for {ip} timed out"
            )));
        }
        Err(failure @ (LookupFailure::ServerFailure | LookupFailure::NetworkError)) => {
            return Err(ToolboxError::DnsServerFailure(format!(
                "PTR lookup for {ip} failed: {failure}"
            )));
        }
    };

    let forward_type = if ip.is_ipv4() {
        DnsQueryType::A
    } else {
        DnsQueryType::Aaaa
    };

    let hostnames = join_all(names.into_iter().map(|hostname| async move {
        let forward_confirmed = backend
            .lookup(&hostname, forward_type)
            .await
            .is_ok_and(|records| {
                records
                    .iter()
                    .any(|r| r.value.parse::<IpAddr>().is_ok_and(|addr| addr == ip))
            });
        ReverseDnsHostname {
            hostname,
            forward_confirmed,
        }
    }))
    .await;

    debug!("[DNS] Reverse lookup for {ip}: {} hostname(s)", hostnames.len());

    Ok(ReverseDnsReport {
        ip: ip.to_string(),
        count: hostnames.len(),
        hostnames,
    })
}
