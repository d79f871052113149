//! WHOIS lookup with best-effort field extraction.
//!
//! Registries format their responses differently, so every field is tried
//! against several line patterns and the first non-empty capture wins.

use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use tokio::time::timeout;
use whois_rust::{WhoIs, WhoIsLookupOptions};

use crate::config::WhoisConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::WhoisResult;

/// Embedded TLD -> WHOIS server table.
const SERVER_LIST: &str = include_str!("whois_servers.json");

/// Compiled line patterns, one list per extracted field.
struct WhoisPatterns {
    registrar: Vec<Regex>,
    created: Vec<Regex>,
    expires: Vec<Regex>,
    updated: Vec<Regex>,
    name_servers: Vec<Regex>,
    status: Vec<Regex>,
}

/// Compile `labels` into patterns that capture the value after `label:` at
/// the start of a line.
fn line_patterns(labels: &[&str]) -> Vec<Regex> {
    labels
        .iter()
        .filter_map(|label| Regex::new(&format!(r"(?im)^[ \t]*{label}:[ \t]*(.*)$")).ok())
        .collect()
}

static PATTERNS: LazyLock<WhoisPatterns> = LazyLock::new(|| WhoisPatterns {
    registrar: line_patterns(&["Registrar", "Registrar Name", "Sponsoring Registrar"]),
    created: line_patterns(&[
        "Creation Date",
        "Created Date",
        "Created",
        "Registration Time",
        "Registration Date",
    ]),
    expires: line_patterns(&[
        "Registry Expiry Date",
        "Expir(?:y|ation) Date",
        "Registrar Registration Expiration Date",
        "Expiration Time",
        "paid-till",
    ]),
    updated: line_patterns(&["Updated Date", "Last Updated", "Last Modified", "changed"]),
    name_servers: line_patterns(&["Name Server", "nserver", "DNS"]),
    status: line_patterns(&["Domain Status", "Status", "state"]),
});

/// WHOIS client over the embedded server table.
pub struct WhoisClient {
    servers: WhoIs,
}

impl WhoisClient {
    /// Client over the embedded server table.
    pub fn new() -> ToolboxResult<Self> {
        Self::from_server_list(SERVER_LIST)
    }

    /// Client over a caller-supplied server table (whois-rust JSON format).
    pub fn from_server_list(json: &str) -> ToolboxResult<Self> {
        let servers = WhoIs::from_string(json).map_err(|e| {
            ToolboxError::NetworkError(format!("Failed to initialize WHOIS client: {e}"))
        })?;
        Ok(Self { servers })
    }

    /// Query WHOIS for `domain` and parse registration fields from the reply.
    pub async fn lookup(&self, domain: &str, config: &WhoisConfig) -> ToolboxResult<WhoisResult> {
        debug!("[WHOIS] Querying {domain}");

        let mut options = WhoIsLookupOptions::from_string(domain)
            .map_err(|e| ToolboxError::ValidationError(format!("Invalid domain: {e}")))?;
        options.timeout = Some(config.timeout());

        let raw = timeout(config.timeout(), self.servers.lookup_async(options))
            .await
            .map_err(|_| {
                warn!("[WHOIS] Query for {domain} timed out");
                ToolboxError::Timeout(format!("WHOIS query timed out ({}s)", config.timeout_secs))
            })?
            .map_err(|e| {
                warn!("[WHOIS] Query for {domain} failed: {e}");
                ToolboxError::NetworkError(format!("WHOIS query failed: {e}"))
            })?;

        Ok(parse_whois_response(domain, &raw))
    }
}

/// Build a [`WhoisResult`] from a raw WHOIS reply.
fn parse_whois_response(domain: &str, raw: &str) -> WhoisResult {
    let patterns = &*PATTERNS;
    WhoisResult {
        domain: domain.to_string(),
        registrar: first_value(raw, &patterns.registrar),
        creation_date: first_value(raw, &patterns.created),
        expiration_date: first_value(raw, &patterns.expires),
        updated_date: first_value(raw, &patterns.updated),
        name_servers: all_values(raw, &patterns.name_servers, normalize_name_server),
        status: all_values(raw, &patterns.status, split_status),
        raw: raw.to_string(),
    }
}

/// First non-empty capture, trying patterns in order.
fn first_value(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Every capture of every pattern, mapped to zero or more values and
/// deduplicated in first-seen order.
fn all_values(text: &str, patterns: &[Regex], split: fn(&str) -> Vec<String>) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for re in patterns {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            for value in split(m.as_str().trim()) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }
    values
}

/// `NS1.Example.COM. 192.0.2.1` -> `ns1.example.com`
fn normalize_name_server(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .next()
        .map(|host| host.trim_end_matches('.').to_lowercase())
        .filter(|host| !host.is_empty())
        .into_iter()
        .collect()
}

/// EPP codes drop their trailing ICANN link; comma lists are split.
fn split_status(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|part| part.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
