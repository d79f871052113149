//! DNS propagation check over public DNS-over-HTTPS resolvers.

use std::time::Instant;

use futures::future::join_all;
use log::{debug, trace};
use serde::Deserialize;
use url::Url;

use crate::config::DohConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{
    DnsPropagationReport, DnsQueryType, DnsServerDescriptor, DohServerResult, PropagationStatus,
};

use super::fetch::{FetchRequest, HttpFetcher, fetch_with_timeout};

/// Return the DoH resolvers used for propagation checks.
pub fn doh_servers() -> Vec<DnsServerDescriptor> {
    [
        ("Google", "United States", "8.8.8.8", "https://dns.google/resolve"),
        (
            "Cloudflare",
            "Global (Anycast)",
            "1.1.1.1",
            "https://cloudflare-dns.com/dns-query",
        ),
        (
            "Quad9",
            "Zurich, Switzerland",
            "9.9.9.9",
            "https://dns.quad9.net:5053/dns-query",
        ),
        (
            "AdGuard",
            "Limassol, Cyprus",
            "94.140.14.14",
            "https://dns.adguard-dns.com/resolve",
        ),
        (
            "Alibaba",
            "Hangzhou, China",
            "223.5.5.5",
            "https://dns.alidns.com/resolve",
        ),
        (
            "DNS.SB",
            "Frankfurt, Germany",
            "185.222.222.222",
            "https://doh.dns.sb/dns-query",
        ),
    ]
    .into_iter()
    .map(|(name, location, ip, doh_url)| DnsServerDescriptor {
        name: name.to_string(),
        location: location.to_string(),
        ip: ip.to_string(),
        doh_url: doh_url.to_string(),
    })
    .collect()
}

/// DNS-JSON response body (RFC 8427 style, as served by the public resolvers).
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// Strip the quotes around each character-string of a presentation-format
/// value and join the strings. `\"` and `\\` inside a string are unescaped.
/// Values that do not start with a quote are returned unchanged.
fn unquote(data: &str) -> String {
    let data = data.trim();
    if !data.starts_with('"') {
        return data.to_string();
    }

    let mut out = String::with_capacity(data.len());
    let mut inside = false;
    let mut chars = data.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => inside = !inside,
            '\\' if inside => match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            _ if inside => out.push(c),
            // Whitespace between strings.
            _ => {}
        }
    }
    out
}

/// Extract de-quoted values of `code` from a DNS-JSON body.
fn parse_answers(body: &str, code: u16) -> Result<Vec<String>, serde_json::Error> {
    let response: DohResponse = serde_json::from_str(body)?;
    Ok(response
        .answer
        .into_iter()
        .filter(|a| a.record_type == code)
        .map(|a| unquote(&a.data))
        .collect())
}

fn query_url(server: &DnsServerDescriptor, domain: &str, code: u16) -> Result<String, String> {
    let mut url = Url::parse(&server.doh_url).map_err(|e| format!("Invalid DoH URL: {e}"))?;
    url.query_pairs_mut()
        .append_pair("name", domain)
        .append_pair("type", &code.to_string());
    Ok(url.into())
}

async fn query_server(
    fetcher: &dyn HttpFetcher,
    server: DnsServerDescriptor,
    domain: &str,
    code: u16,
    config: &DohConfig,
) -> DohServerResult {
    let start = Instant::now();

    let outcome = match query_url(&server, domain, code) {
        Ok(url) => {
            let request = FetchRequest::get(url, config.query_timeout())
                .with_header("accept", "application/dns-json")
                .with_body();
            match fetch_with_timeout(fetcher, request).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    parse_answers(response.body.as_deref().unwrap_or_default(), code)
                        .map_err(|e| format!("Invalid DNS-JSON response: {e}"))
                }
                Ok(response) => Err(format!("HTTP {}", response.status)),
                Err(e) => Err(e.message),
            }
        }
        Err(e) => Err(e),
    };

    // u128 -> u64: elapsed millis for a DoH query will never exceed u64::MAX
    #[allow(clippy::cast_possible_truncation)]
    let response_time_ms = start.elapsed().as_millis() as u64;

    trace!("[DOH] {} answered in {response_time_ms}ms", server.name);

    match outcome {
        Ok(records) if records.is_empty() => DohServerResult {
            server,
            status: PropagationStatus::NoRecords,
            records,
            error: None,
            response_time_ms,
        },
        Ok(records) => DohServerResult {
            server,
            status: PropagationStatus::Resolved,
            records,
            error: None,
            response_time_ms,
        },
        Err(error) => DohServerResult {
            server,
            status: PropagationStatus::Error,
            records: Vec::new(),
            error: Some(error),
            response_time_ms,
        },
    }
}

/// Aggregate per-server results into a report.
fn summarize(
    domain: &str,
    record_type: DnsQueryType,
    results: Vec<DohServerResult>,
) -> DnsPropagationReport {
    let resolved_count = results
        .iter()
        .filter(|r| r.status == PropagationStatus::Resolved)
        .count();
    let total_servers = results.len();

    DnsPropagationReport {
        domain: domain.to_string(),
        record_type,
        propagated: resolved_count == total_servers && resolved_count > 0,
        resolved_count,
        total_servers,
        results,
    }
}

/// Query every DoH resolver in parallel for `domain`/`record_type`.
pub async fn dns_propagation_check(
    fetcher: &dyn HttpFetcher,
    domain: &str,
    record_type: DnsQueryType,
    config: &DohConfig,
) -> ToolboxResult<DnsPropagationReport> {
    let code = record_type.doh_code().ok_or_else(|| {
        ToolboxError::ValidationError(format!(
            "Unsupported record type for propagation check: {record_type}"
        ))
    })?;

    debug!("[DOH] Checking {record_type} propagation for {domain}");

    let results = join_all(
        doh_servers()
            .into_iter()
            .map(|server| query_server(fetcher, server, domain, code, config)),
    )
    .await;

    let report = summarize(domain, record_type, results);
    debug!(
        "[DOH] {domain}: {}/{} resolvers resolved",
        report.resolved_count, report.total_servers
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::time::Duration;

    use super::*;
    use crate::test_utils::MockHttpFetcher;
    use crate::types::NetworkErrorKind;

    const A_ANSWER: &str = r#"{"Status":0,"Answer":[{"name":"example.com.","type":1,"TTL":300,"data":"93.184.216.34"}]}"#;
    const EMPTY_ANSWER: &str = r#"{"Status":3,"Authority":[]}"#;

    async fn check(
        fetcher: &MockHttpFetcher,
        record_type: DnsQueryType,
    ) -> ToolboxResult<DnsPropagationReport> {
        dns_propagation_check(fetcher, "example.com", record_type, &DohConfig::default()).await
    }

    fn fetcher_with(body_for: impl Fn(&DnsServerDescriptor) -> &'static str) -> MockHttpFetcher {
        doh_servers()
            .iter()
            .fold(MockHttpFetcher::new(), |fetcher, server| {
                fetcher.with_json(&server.doh_url, body_for(server))
            })
    }

    // ==================== doh_servers tests ====================

    #[test]
    fn test_doh_servers_fixed_set() {
        let servers = doh_servers();
        assert_eq!(servers.len(), 6);
        for server in &servers {
            assert!(server.doh_url.starts_with("https://"), "{}", server.name);
            assert!(server.ip.parse::<std::net::IpAddr>().is_ok());
            assert!(!server.location.is_empty());
        }
    }

    // ==================== parse_answers tests ====================

    #[test]
    fn test_parse_answers_filters_type_and_dequotes() {
        let body = r#"{"Answer":[
            {"name":"example.com.","type":5,"TTL":60,"data":"alias.example.net."},
            {"name":"example.com.","type":16,"TTL":60,"data":"\"v=spf1 -all\""}
        ]}"#;
        assert_eq!(parse_answers(body, 16).unwrap(), vec!["v=spf1 -all"]);
        assert!(parse_answers(body, 1).unwrap().is_empty());
    }

    #[test]
    fn test_unquote_keeps_inner_quotes() {
        assert_eq!(unquote(r#""v=spf1 -all""#), "v=spf1 -all");
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote(r#""part one" "part two""#), "part onepart two");
        assert_eq!(unquote(r#""a\\b""#), r"a\b");
        assert_eq!(unquote("93.184.216.34"), "93.184.216.34");
        assert_eq!(unquote("10 mail.example.com."), "10 mail.example.com.");
    }

    #[test]
    fn test_parse_answers_missing_answer_section() {
        assert!(parse_answers(EMPTY_ANSWER, 1).unwrap().is_empty());
        assert!(parse_answers("not json", 1).is_err());
    }

    #[test]
    fn test_query_url_params() {
        let server = &doh_servers()[0];
        let url = query_url(server, "example.com", 28).unwrap();
        assert_eq!(url, "https://dns.google/resolve?name=example.com&type=28");
    }

    // ==================== dns_propagation_check tests ====================

    #[tokio::test]
    async fn test_all_resolved_is_propagated() {
        let fetcher = fetcher_with(|_| A_ANSWER);
        let report = check(&fetcher, DnsQueryType::A).await.unwrap();
        assert!(report.propagated);
        assert_eq!(report.resolved_count, 6);
        assert_eq!(report.results[0].records, vec!["93.184.216.34"]);
    }

    #[tokio::test]
    async fn test_one_empty_resolver_blocks_propagation() {
        let fetcher = fetcher_with(|server| {
            if server.name == "Alibaba" {
                EMPTY_ANSWER
            } else {
                A_ANSWER
            }
        });
        let report = check(&fetcher, DnsQueryType::A).await.unwrap();

        assert!(!report.propagated);
        assert_eq!(report.resolved_count, 5);
        assert_eq!(report.total_servers, 6);
        let alibaba = report
            .results
            .iter()
            .find(|r| r.server.name == "Alibaba")
            .unwrap();
        assert_eq!(alibaba.status, PropagationStatus::NoRecords);
        assert!(alibaba.error.is_none());
    }

    #[tokio::test]
    async fn test_errors_are_per_server() {
        let servers = doh_servers();
        let fetcher = MockHttpFetcher::new()
            .with_json(&servers[0].doh_url, A_ANSWER)
            .with_status(&servers[1].doh_url, 503, &[])
            .with_json(&servers[2].doh_url, "<html>")
            .with_error(&servers[3].doh_url, NetworkErrorKind::ConnectionReset, "reset");

        let report = check(&fetcher, DnsQueryType::A).await.unwrap();

        assert_eq!(report.results[0].status, PropagationStatus::Resolved);
        assert_eq!(report.results[1].status, PropagationStatus::Error);
        assert_eq!(report.results[1].error.as_deref(), Some("HTTP 503"));
        assert_eq!(report.results[2].status, PropagationStatus::Error);
        assert_eq!(report.results[3].status, PropagationStatus::Error);
        assert_eq!(report.resolved_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_server_times_out() {
        let servers = doh_servers();
        let slow = format!("{}?name=example.com&type=1", servers[0].doh_url);
        let fetcher = fetcher_with(|_| A_ANSWER).with_delay(&slow, Duration::from_secs(30));

        let report = check(&fetcher, DnsQueryType::A).await.unwrap();

        assert_eq!(report.results[0].status, PropagationStatus::Error);
        assert!(report.results[0].error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.resolved_count, 5);
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected() {
        let fetcher = MockHttpFetcher::new();
        let result = check(&fetcher, DnsQueryType::Soa).await;
        assert!(matches!(result, Err(ToolboxError::ValidationError(_))));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_dns_propagation_check_real() {
        let fetcher = crate::services::fetch::ReqwestFetcher::new().unwrap();
        let report =
            dns_propagation_check(&fetcher, "google.com", DnsQueryType::A, &DohConfig::default())
                .await
                .unwrap();
        assert_eq!(report.total_servers, 6);
        assert!(report.resolved_count > 0);
    }
}
