//! Domain availability across popular TLDs.
//!
//! This is a DNS heuristic, not a registry query: a name that has an A or NS
//! record is registered, anything else is reported as available. Registered
//! domains without delegation will show up as available.

use log::{debug, warn};
use tokio::time::sleep;

use crate::config::AvailabilityConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{AvailabilityReport, DnsQueryType, TldAvailability};

use super::resolver::DnsBackend;
use super::runner::run_bounded_until;

/// TLDs checked, in report order.
pub const TLDS: [&str; 10] = ["com", "io", "dev", "app", "co", "net", "org", "ai", "so", "me"];

async fn check_tld(backend: &dyn DnsBackend, name: &str, tld: &str) -> TldAvailability {
    let full_domain = format!("{name}.{tld}");

    // Stage 1: an address record means the domain is in use.
    if let Ok(records) = backend.lookup(&full_domain, DnsQueryType::A).await
        && let Some(first) = records.into_iter().next()
    {
        return TldAvailability {
            tld: tld.to_string(),
            full_domain,
            available: false,
            ip: Some(first.value),
        };
    }

    // Stage 2: delegated but not pointing anywhere.
    let delegated = backend
        .lookup(&full_domain, DnsQueryType::Ns)
        .await
        .is_ok_and(|records| !records.is_empty());

    TldAvailability {
        tld: tld.to_string(),
        full_domain,
        available: !delegated,
        ip: None,
    }
}

/// Check `name` under every TLD in [`TLDS`].
///
/// Fails with [`ToolboxError::Timeout`] when the deadline fires, unless
/// `partial_results_on_timeout` is set, in which case the TLDs finished so
/// far are returned.
pub async fn domain_availability(
    backend: &dyn DnsBackend,
    name: &str,
    config: &AvailabilityConfig,
) -> ToolboxResult<AvailabilityReport> {
    debug!("[Availability] Checking {name} across {} TLDs", TLDS.len());

    let tasks: Vec<_> = TLDS
        .iter()
        .map(|tld| check_tld(backend, name, tld))
        .collect();

    let run = run_bounded_until(tasks, config.concurrency, sleep(config.deadline())).await;

    if run.interrupted && !config.partial_results_on_timeout {
        warn!("[Availability] Deadline reached for {name}");
        return Err(ToolboxError::Timeout(format!(
            "Domain availability check timed out ({}s)",
            config.deadline_secs
        )));
    }

    Ok(AvailabilityReport {
        domain: name.to_string(),
        results: run.completed().collect(),
    })
}
