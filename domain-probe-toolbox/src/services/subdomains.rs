//! Subdomain enumeration over a fixed wordlist.

use log::{debug, trace};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::SubdomainConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{DnsQueryType, SubdomainHit, SubdomainReport};

use super::resolver::DnsBackend;
use super::runner::run_bounded_until;

/// Common subdomain labels, probed in this order.
pub const WORDLIST: &[&str] = &[
    "www", "mail", "ftp", "smtp", "pop", "imap", "webmail", "remote", "vpn", "ns1", "ns2", "ns3",
    "mx", "mx1", "mx2", "api", "app", "apps", "dev", "staging", "stage", "test", "qa", "uat",
    "demo", "beta", "alpha", "sandbox", "admin", "portal", "dashboard", "panel", "cpanel",
    "whm", "login", "auth", "sso", "id", "accounts", "account", "blog", "shop", "store", "cdn",
    "static", "assets", "media", "img", "images", "files", "download", "docs", "help",
    "support", "status", "monitor", "grafana", "kibana", "jenkins", "ci", "git", "gitlab",
    "jira", "wiki", "confluence", "m", "mobile", "secure", "cloud", "db", "mysql", "redis",
    "search", "news", "forum", "community", "chat", "office", "intranet", "internal", "proxy",
    "gateway", "autodiscover", "calendar", "video",
];

async fn probe_label(
    backend: &dyn DnsBackend,
    label: &'static str,
    domain: &str,
    config: &SubdomainConfig,
) -> Option<SubdomainHit> {
    let fqdn = format!("{label}.{domain}");
    let records = match timeout(
        config.lookup_timeout(),
        backend.lookup(&fqdn, DnsQueryType::A),
    )
    .await
    {
        Ok(Ok(records)) if !records.is_empty() => records,
        Ok(_) => return None,
        Err(_) => {
            trace!("[Subdomains] Lookup for {fqdn} timed out");
            return None;
        }
    };

    Some(SubdomainHit {
        subdomain: label.to_string(),
        ips: records.into_iter().map(|r| r.value).collect(),
        fqdn,
    })
}

/// Probe every [`WORDLIST`] label under `domain`.
///
/// Stops at the overall deadline or when `cancel` fires. Labels resolved so
/// far are returned unless `partial_results_on_timeout` is disabled.
pub async fn enumerate_subdomains(
    backend: &dyn DnsBackend,
    domain: &str,
    config: &SubdomainConfig,
    cancel: Option<CancellationToken>,
) -> ToolboxResult<SubdomainReport> {
    debug!(
        "[Subdomains] Enumerating {} labels under {domain}",
        WORDLIST.len()
    );

    let tasks: Vec<_> = WORDLIST
        .iter()
        .map(|label| probe_label(backend, label, domain, config))
        .collect();

    let deadline = sleep(config.deadline());
    let stop = async move {
        match cancel {
            Some(token) => {
                tokio::select! {
                    () = deadline => {}
                    () = token.cancelled() => {}
                }
            }
            None => deadline.await,
        }
    };

    let run = run_bounded_until(tasks, config.concurrency, stop).await;

    if run.interrupted && !config.partial_results_on_timeout {
        return Err(ToolboxError::Timeout(format!(
            "Subdomain enumeration timed out ({}s)",
            config.deadline_secs
        )));
    }

    let found: Vec<SubdomainHit> = run.completed().flatten().collect();
    debug!("[Subdomains] {domain}: {} label(s) resolved", found.len());

    Ok(SubdomainReport {
        domain: domain.to_string(),
        total_checked: WORDLIST.len(),
        found,
    })
}
