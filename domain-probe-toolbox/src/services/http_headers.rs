//! HTTP security header grading.

use std::collections::BTreeMap;

use log::debug;
use url::Url;

use crate::config::HeaderGradingConfig;
use crate::error::ToolboxResult;
use crate::types::{HttpHeader, HttpHeaderGradeReport, SecurityCheck, SecurityGrade};

use super::fetch::HttpFetcher;
use super::redirect::RedirectTracer;

/// Graded security headers and their weights.
const SECURITY_HEADERS: &[(&str, f64)] = &[
    ("strict-transport-security", 2.0),
    ("content-security-policy", 2.0),
    ("x-frame-options", 1.0),
    ("x-content-type-options", 1.0),
    ("referrer-policy", 1.0),
    ("permissions-policy", 1.0),
    ("x-xss-protection", 0.5),
];

/// Percentage thresholds, highest first.
const GRADE_THRESHOLDS: &[(f64, &str)] = &[
    (90.0, "A+"),
    (80.0, "A"),
    (70.0, "B"),
    (55.0, "C"),
    (40.0, "D"),
];

/// Return a human-readable recommendation for a missing security header.
fn get_recommendation(header_name: &str) -> String {
    match header_name {
        "strict-transport-security" => {
            "Add HSTS header to enforce HTTPS connections (e.g. max-age=31536000; includeSubDomains)"
                .to_string()
        }
        "x-frame-options" => "Add to prevent clickjacking attacks (DENY or SAMEORIGIN)".to_string(),
        "x-content-type-options" => "Set to 'nosniff' to prevent MIME type sniffing".to_string(),
        "content-security-policy" => "Add CSP header to prevent XSS attacks".to_string(),
        "referrer-policy" => "Set Referrer-Policy to control referrer information".to_string(),
        "permissions-policy" => "Set Permissions-Policy to restrict browser features".to_string(),
        "x-xss-protection" => "Add to enable the legacy browser XSS filter".to_string(),
        _ => "Consider adding this security header".to_string(),
    }
}

/// Letter grade for a score percentage.
fn grade_for(percentage: f64) -> &'static str {
    GRADE_THRESHOLDS
        .iter()
        .find(|(threshold, _)| percentage >= *threshold)
        .map_or("F", |&(_, grade)| grade)
}

/// Score response headers against the weighted security header list.
///
/// A header counts as present when it has a non-empty value.
pub(crate) fn grade_headers(headers: &[HttpHeader]) -> SecurityGrade {
    let max_score: f64 = SECURITY_HEADERS.iter().map(|(_, weight)| weight).sum();

    let checks: Vec<SecurityCheck> = SECURITY_HEADERS
        .iter()
        .map(|&(name, weight)| {
            let value = headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name) && !h.value.trim().is_empty())
                .map(|h| h.value.clone());
            SecurityCheck {
                header: name.to_string(),
                present: value.is_some(),
                weight,
                recommendation: value.is_none().then(|| get_recommendation(name)),
                value,
            }
        })
        .collect();

    let score: f64 = checks.iter().filter(|c| c.present).map(|c| c.weight).sum();
    let percentage = score / max_score * 100.0;

    SecurityGrade {
        grade: grade_for(percentage).to_string(),
        score,
        max_score,
        checks,
    }
}

/// Collapse headers into a lower-case name map, joining repeated headers.
fn header_map(headers: &[HttpHeader]) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for header in headers {
        map.entry(header.name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&header.value);
            })
            .or_insert_with(|| header.value.clone());
    }
    map
}

/// Follow redirects to the final response and grade its security headers.
pub async fn http_header_check(
    fetcher: &dyn HttpFetcher,
    url: &Url,
    config: &HeaderGradingConfig,
) -> ToolboxResult<HttpHeaderGradeReport> {
    debug!("[HTTP] Checking security headers for {url}");

    let chain = RedirectTracer::new(fetcher, config.tracer_config())
        .trace(url)
        .await?;

    let (redirects, final_hop) = match chain.hops.split_last() {
        Some((last, rest)) => (rest.to_vec(), Some(last)),
        None => (Vec::new(), None),
    };
    let final_url = final_hop.map_or_else(|| url.to_string(), |hop| hop.url.clone());
    let final_status = final_hop.map_or(0, |hop| hop.status);

    let security = grade_headers(&chain.last_response.headers);
    debug!(
        "[HTTP] {final_url}: grade {} ({}/{})",
        security.grade, security.score, security.max_score
    );

    Ok(HttpHeaderGradeReport {
        url: url.to_string(),
        redirects,
        final_url,
        final_status,
        headers: header_map(&chain.last_response.headers),
        security,
    })
}
