//! Website liveness with a side-by-side certificate check.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use log::{debug, trace};
use reqwest::StatusCode;
use tokio::time::{Duration, timeout};
use url::{Host, Url};

use crate::config::{TlsConfig, WebsiteStatusConfig};
use crate::types::{DnsQueryType, LookupFailure, NetworkErrorKind, WebsiteStatusReport};

use super::fetch::{FetchError, FetchRequest, FetchedResponse, HttpFetcher, fetch_with_timeout};
use super::resolver::DnsBackend;
use super::ssl::{TlsSummary, tls_summary_at};

/// Host and port for the certificate check, `None` for plain http.
fn tls_target(url: &Url) -> Option<(String, u16)> {
    if url.scheme() != "https" {
        return None;
    }
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };
    Some((host, url.port_or_known_default().unwrap_or(443)))
}

/// Resolve the host before fetching so that unknown names are reported as
/// `dns` failures. Only a definite "no such name" for both A and AAAA counts;
/// resolver trouble or a slow resolver leaves the verdict to the fetch itself.
async fn preflight(dns: &dyn DnsBackend, url: &Url, limit: Duration) -> Result<(), FetchError> {
    let Some(Host::Domain(host)) = url.host() else {
        return Ok(());
    };

    let lookups = async {
        tokio::join!(
            dns.lookup(host, DnsQueryType::A),
            dns.lookup(host, DnsQueryType::Aaaa)
        )
    };
    let Ok((v4, v6)) = timeout(limit, lookups).await else {
        trace!("[Status] Pre-flight lookup for {host} timed out");
        return Ok(());
    };

    let mut unknown = true;
    for (record_type, outcome) in [(DnsQueryType::A, v4), (DnsQueryType::Aaaa, v6)] {
        match outcome {
            Ok(records) if !records.is_empty() => return Ok(()),
            Ok(_) | Err(LookupFailure::NotFound) => {}
            Err(failure) => {
                trace!("[Status] Pre-flight {record_type} lookup for {host}: {failure}");
                unknown = false;
            }
        }
    }
    if !unknown {
        return Ok(());
    }

    Err(FetchError::new(
        NetworkErrorKind::Dns,
        format!("Could not resolve host {host}"),
    ))
}

/// HEAD with redirect following, retried as GET on 405 or any HEAD failure.
async fn liveness(
    dns: &dyn DnsBackend,
    fetcher: &dyn HttpFetcher,
    url: &Url,
    config: &WebsiteStatusConfig,
) -> Result<FetchedResponse, FetchError> {
    preflight(dns, url, config.request_timeout()).await?;

    let head = FetchRequest::head(url.as_str(), config.request_timeout()).following_redirects();
    match fetch_with_timeout(fetcher, head).await {
        Ok(response) if response.status != StatusCode::METHOD_NOT_ALLOWED.as_u16() => {
            return Ok(response);
        }
        Ok(_) => debug!("[Status] HEAD not allowed on {url}, retrying with GET"),
        Err(e) => debug!("[Status] HEAD {url} failed ({e}), retrying with GET"),
    }

    let get = FetchRequest::get(url.as_str(), config.request_timeout()).following_redirects();
    fetch_with_timeout(fetcher, get).await
}

/// Check whether `url` answers and, for https, whether its certificate is valid.
///
/// Always produces a report; failures are described by `error`/`errorType`.
pub async fn website_status(
    dns: &dyn DnsBackend,
    fetcher: &dyn HttpFetcher,
    url: &Url,
    config: &WebsiteStatusConfig,
    tls_config: &TlsConfig,
) -> WebsiteStatusReport {
    debug!("[Status] Checking {url}");

    let timed_liveness = async {
        let started = Instant::now();
        let outcome = liveness(dns, fetcher, url, config).await;
        // u128 -> u64: a single status check never runs for u64::MAX millis
        #[allow(clippy::cast_possible_truncation)]
        let elapsed = started.elapsed().as_millis() as u64;
        (outcome, elapsed)
    };
    let certificate = async {
        match tls_target(url) {
            Some((host, port)) => Some(tls_summary_at(&host, port, tls_config).await),
            None => None,
        }
    };

    let ((outcome, response_time), tls) = tokio::join!(timed_liveness, certificate);
    let tls = tls.unwrap_or_default();

    let (status_code, error, error_type) = match outcome {
        Ok(response) => (Some(response.status), None, None),
        Err(e) => (None, Some(e.message), Some(e.kind)),
    };
    let status_text = status_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .and_then(|status| status.canonical_reason())
        .map(str::to_string);
    let is_up = status_code.is_some_and(|code| code < 500);

    debug!(
        "[Status] {url}: up={is_up}, status={status_code:?}, ssl_valid={}, {response_time}ms",
        tls.valid
    );

    let TlsSummary {
        valid,
        days_remaining,
        expiry,
        error: ssl_error,
    } = tls;

    WebsiteStatusReport {
        is_up,
        url: url.to_string(),
        status_code,
        status_text,
        response_time,
        ssl_valid: valid,
        ssl_days_remaining: days_remaining,
        ssl_expiry: expiry,
        ssl_error,
        error,
        error_type,
        checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}
