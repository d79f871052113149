//! Input validation and normalisation.
//!
//! Every probe validates its input here before doing any I/O.

use std::net::IpAddr;

use url::Url;

use crate::error::{ToolboxError, ToolboxResult};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;
const MAX_URL_LEN: usize = 2048;

fn invalid(message: impl Into<String>) -> ToolboxError {
    ToolboxError::ValidationError(message.into())
}

fn check_label(label: &str) -> ToolboxResult<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(invalid(format!(
            "Domain labels must be 1-{MAX_LABEL_LEN} characters"
        )));
    }
    if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(invalid(format!("Invalid characters in label: {label}")));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(invalid(format!(
            "Label cannot start or end with a hyphen: {label}"
        )));
    }
    Ok(())
}

/// Convert a (possibly internationalised) name to lower-case ASCII.
fn to_ascii(input: &str) -> ToolboxResult<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid("Domain name is required"));
    }
    // IDNA processing: converts Unicode labels to Punycode and validates.
    idna::domain_to_ascii_strict(input)
        .map(|ascii| ascii.to_ascii_lowercase())
        .map_err(|_| invalid(format!("Invalid domain name: {input}")))
}

/// Validate a fully qualified domain name with at least two labels.
///
/// Returns the lower-case ASCII form.
pub fn validate_domain(input: &str) -> ToolboxResult<String> {
    let domain = to_ascii(input)?;
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(invalid(format!(
            "Domain name exceeds maximum length of {MAX_DOMAIN_LEN} characters (got {})",
            domain.len()
        )));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid(format!(
            "Domain must have at least two labels: {domain}"
        )));
    }
    for label in labels {
        check_label(label)?;
    }
    Ok(domain)
}

/// Validate a domain used as the base of subdomain enumeration.
///
/// There is no public suffix list here, so only the obvious case is rejected:
/// a leading `www` label on a name with three or more labels.
pub fn validate_root_domain(input: &str) -> ToolboxResult<String> {
    let domain = validate_domain(input)?;
    if let Some(rest) = domain.strip_prefix("www.")
        && rest.contains('.')
    {
        return Err(invalid(format!(
            "Enter the root domain without a subdomain (e.g. \"{rest}\")"
        )));
    }
    Ok(domain)
}

/// Validate a bare name (a single label, no TLD) for the availability check.
pub fn validate_bare_name(input: &str) -> ToolboxResult<String> {
    let name = to_ascii(input)?;
    if name.contains('.') {
        return Err(invalid("Enter a name without a TLD (e.g. \"example\")"));
    }
    check_label(&name)?;
    Ok(name)
}

/// Parse an IPv4 or IPv6 address.
pub fn validate_ip(input: &str) -> ToolboxResult<IpAddr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid("IP address is required"));
    }
    input
        .parse()
        .map_err(|_| invalid(format!("Invalid IP address: {input}")))
}

/// Normalise a URL to an absolute `http(s)` URL, assuming `https://` when no
/// scheme is given.
pub fn normalize_url(input: &str) -> ToolboxResult<Url> {
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid("URL is required"));
    }
    if input.len() > MAX_URL_LEN {
        return Err(invalid(format!(
            "URL exceeds maximum length of {MAX_URL_LEN} characters"
        )));
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| invalid(format!("Invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "Unsupported URL scheme: {} (only http and https are allowed)",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("URL must include a host"));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn is_validation_error<T: std::fmt::Debug>(result: ToolboxResult<T>) -> bool {
        matches!(result, Err(ToolboxError::ValidationError(_)))
    }

    // ==================== validate_domain tests ====================

    #[test]
    fn test_validate_domain_normal() {
        assert_eq!(validate_domain("example.com").unwrap(), "example.com");
    }

    #[test]
    fn test_validate_domain_lowercases_and_trims() {
        assert_eq!(validate_domain("  Example.COM  ").unwrap(), "example.com");
    }

    #[test]
    fn test_validate_domain_idn() {
        assert_eq!(validate_domain("münchen.de").unwrap(), "xn--mnchen-3ya.de");
    }

    #[test]
    fn test_validate_domain_empty() {
        assert!(is_validation_error(validate_domain("")));
        assert!(is_validation_error(validate_domain("   ")));
    }

    #[test]
    fn test_validate_domain_single_label() {
        assert!(is_validation_error(validate_domain("localhost")));
    }

    #[test]
    fn test_validate_domain_invalid() {
        assert!(is_validation_error(validate_domain("not a valid domain!!!")));
        assert!(is_validation_error(validate_domain("-bad.example.com")));
        assert!(is_validation_error(validate_domain("bad-.example.com")));
        assert!(is_validation_error(validate_domain("under_score.com")));
        assert!(is_validation_error(validate_domain("a..com")));
    }

    #[test]
    fn test_validate_domain_label_length() {
        let ok = format!("{}.com", "a".repeat(63));
        assert!(validate_domain(&ok).is_ok());
        let too_long = format!("{}.com", "a".repeat(64));
        assert!(is_validation_error(validate_domain(&too_long)));
    }

    /// Build a domain of exactly `len` characters from 63-char labels.
    fn domain_of_len(len: usize) -> String {
        let mut labels = Vec::new();
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(63);
            labels.push("a".repeat(take));
            // Account for the dot before the next label.
            remaining = remaining.saturating_sub(take + 1);
        }
        let domain = labels.join(".");
        assert_eq!(domain.len(), len, "helper produced wrong length");
        domain
    }

    #[test]
    fn test_validate_domain_length_boundary() {
        let max = domain_of_len(253);
        assert_eq!(validate_domain(&max).unwrap().len(), 253);

        let over = domain_of_len(254);
        assert!(is_validation_error(validate_domain(&over)));
    }

    // ==================== validate_root_domain tests ====================

    #[test]
    fn test_validate_root_domain_rejects_www() {
        assert!(is_validation_error(validate_root_domain("www.example.com")));
        assert!(is_validation_error(validate_root_domain("WWW.Example.co.uk")));
        assert_eq!(validate_root_domain("example.com").unwrap(), "example.com");
        assert_eq!(validate_root_domain("example.co.uk").unwrap(), "example.co.uk");
        // `www` as the registrable label itself is fine.
        assert_eq!(validate_root_domain("www.com").unwrap(), "www.com");
    }

    // ==================== validate_bare_name tests ====================

    #[test]
    fn test_validate_bare_name() {
        assert_eq!(validate_bare_name("MyBrand").unwrap(), "mybrand");
        assert!(is_validation_error(validate_bare_name("mybrand.com")));
        assert!(is_validation_error(validate_bare_name("-brand")));
        assert!(is_validation_error(validate_bare_name(&"a".repeat(64))));
        assert!(is_validation_error(validate_bare_name("")));
    }

    // ==================== validate_ip tests ====================

    #[test]
    fn test_validate_ip() {
        assert_eq!(
            validate_ip(" 8.8.8.8 ").unwrap(),
            "8.8.8.8".parse::<IpAddr>().unwrap()
        );
        assert!(validate_ip("2606:4700::1111").unwrap().is_ipv6());
        assert!(is_validation_error(validate_ip("999.1.1.1")));
        assert!(is_validation_error(validate_ip("example.com")));
        assert!(is_validation_error(validate_ip("")));
    }

    // ==================== normalize_url tests ====================

    #[test]
    fn test_normalize_url_defaults_to_https() {
        let url = normalize_url("example.com/path").unwrap();
        assert_eq!(url.as_str(), "https://example.com/path");
    }

    #[test]
    fn test_normalize_url_keeps_http() {
        let url = normalize_url("http://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_normalize_url_rejects_other_schemes() {
        assert!(is_validation_error(normalize_url("ftp://example.com")));
        assert!(is_validation_error(normalize_url("file:///etc/passwd")));
    }

    #[test]
    fn test_normalize_url_rejects_garbage_and_length() {
        assert!(is_validation_error(normalize_url("")));
        assert!(is_validation_error(normalize_url("https://")));
        let long = format!("https://example.com/{}", "a".repeat(2048));
        assert!(is_validation_error(normalize_url(&long)));
    }
}
