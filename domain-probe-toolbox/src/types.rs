//! Public types returned by toolbox operations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// DNS record type for lookup and propagation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsQueryType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    Aaaa,
    /// Canonical name (alias) record.
    Cname,
    /// Mail exchange record.
    Mx,
    /// Text record.
    Txt,
    /// Name server record.
    Ns,
    /// Start of authority record.
    Soa,
    /// Pointer record (reverse DNS).
    Ptr,
}

impl DnsQueryType {
    /// Record types resolved by the DNS lookup tool, in report order.
    pub const LOOKUP_TYPES: [Self; 7] = [
        Self::A,
        Self::Aaaa,
        Self::Cname,
        Self::Mx,
        Self::Txt,
        Self::Ns,
        Self::Soa,
    ];

    /// Numeric RR type used by DNS-JSON resolvers, for the types the
    /// propagation check accepts.
    pub fn doh_code(self) -> Option<u16> {
        match self {
            Self::A => Some(1),
            Self::Aaaa => Some(28),
            Self::Cname => Some(5),
            Self::Mx => Some(15),
            Self::Txt => Some(16),
            Self::Ns => Some(2),
            Self::Soa | Self::Ptr => None,
        }
    }
}

impl fmt::Display for DnsQueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Aaaa => write!(f, "AAAA"),
            Self::Cname => write!(f, "CNAME"),
            Self::Mx => write!(f, "MX"),
            Self::Txt => write!(f, "TXT"),
            Self::Ns => write!(f, "NS"),
            Self::Soa => write!(f, "SOA"),
            Self::Ptr => write!(f, "PTR"),
        }
    }
}

impl FromStr for DnsQueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::Aaaa),
            "CNAME" => Ok(Self::Cname),
            "MX" => Ok(Self::Mx),
            "TXT" => Ok(Self::Txt),
            "NS" => Ok(Self::Ns),
            "SOA" => Ok(Self::Soa),
            "PTR" => Ok(Self::Ptr),
            _ => Err(format!("Unsupported DNS query type: {s}")),
        }
    }
}

/// Why a single fan-out item produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailure {
    Timeout,
    /// NXDOMAIN or NODATA.
    NotFound,
    /// SERVFAIL, REFUSED and other failure response codes.
    ServerFailure,
    NetworkError,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::NotFound => write!(f, "not_found"),
            Self::ServerFailure => write!(f, "server_failure"),
            Self::NetworkError => write!(f, "network_error"),
        }
    }
}

/// Outcome of one fallible sub-operation.
pub type TaskResult<T> = Result<T, LookupFailure>;

/// A single DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    /// Record value / rdata.
    ///
    /// Trailing dots are removed from domain names. `SOA` is rendered as
    /// `mname rname serial refresh retry expire minimum`.
    pub value: String,
    /// Time-to-live in seconds.
    pub ttl: u32,
    /// Preference (MX records only).
    pub priority: Option<u16>,
}

/// Records of one type, or the reason there are none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsTypeResult {
    #[serde(rename = "type")]
    pub record_type: DnsQueryType,
    pub records: Vec<DnsRecord>,
    pub error: Option<LookupFailure>,
}

/// Result of the multi-type DNS lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsLookupReport {
    pub domain: String,
    pub results: Vec<DnsTypeResult>,
}

/// A public DNS-over-HTTPS resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsServerDescriptor {
    /// Display name (e.g. `"Google"`).
    pub name: String,
    /// Location label.
    pub location: String,
    /// Anycast address of the resolver.
    pub ip: String,
    /// DNS-JSON endpoint.
    pub doh_url: String,
}

/// Propagation status reported by one resolver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropagationStatus {
    Resolved,
    NoRecords,
    Error,
}

/// Answer of a single resolver in a propagation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DohServerResult {
    pub server: DnsServerDescriptor,
    pub status: PropagationStatus,
    /// De-quoted record values of the requested type.
    pub records: Vec<String>,
    pub error: Option<String>,
    pub response_time_ms: u64,
}

/// DNS propagation check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsPropagationReport {
    pub domain: String,
    #[serde(rename = "type")]
    pub record_type: DnsQueryType,
    pub results: Vec<DohServerResult>,
    /// Every resolver resolved the record, and there was at least one resolver.
    pub propagated: bool,
    pub resolved_count: usize,
    pub total_servers: usize,
}

/// Availability of one `name.tld`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TldAvailability {
    pub tld: String,
    pub full_domain: String,
    pub available: bool,
    /// First A record when the domain resolves.
    pub ip: Option<String>,
}

/// Availability of a name across the checked TLDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub domain: String,
    pub results: Vec<TldAvailability>,
}

/// A subdomain label that resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainHit {
    pub subdomain: String,
    pub fqdn: String,
    pub ips: Vec<String>,
}

/// Subdomain enumeration result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainReport {
    pub domain: String,
    /// Number of labels in the wordlist.
    pub total_checked: usize,
    pub found: Vec<SubdomainHit>,
}

/// One request in a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    pub url: String,
    /// HTTP status, `0` for the marker hop appended when a loop is detected.
    pub status: u16,
    pub location: Option<String>,
    /// Elapsed milliseconds for this hop.
    pub response_time: u64,
}

/// Redirect trace result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectTraceReport {
    pub url: String,
    pub hops: Vec<RedirectHop>,
    pub final_url: String,
    pub final_status: u16,
    pub total_hops: usize,
    pub total_response_time: u64,
    pub is_loop: bool,
    pub message: Option<String>,
}

/// Metadata of one X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Subject attributes keyed by short name (`CN`, `O`, `C`, ...).
    pub subject: BTreeMap<String, String>,
    /// Issuer attributes keyed by short name.
    pub issuer: BTreeMap<String, String>,
    /// Not-before date (RFC 3339, UTC).
    pub valid_from: String,
    /// Not-after date (RFC 3339, UTC).
    pub valid_to: String,
    /// Days until expiration (negative if expired).
    pub days_remaining: i64,
    /// Serial number (upper-case hex).
    pub serial_number: String,
    /// SHA-1 fingerprint, colon-separated upper-case hex.
    pub fingerprint: String,
    /// SHA-256 fingerprint, colon-separated upper-case hex.
    pub fingerprint256: String,
    /// DNS names from the subject alternative name extension.
    pub subject_alt_names: Vec<String>,
    /// Negotiated protocol (e.g. `"TLSv1.3"`); set on the leaf only.
    pub protocol: Option<String>,
}

/// TLS certificate inspection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateReport {
    pub domain: String,
    pub cert: CertificateInfo,
    /// Issuer chain above the leaf, nearest issuer first.
    pub chain: Vec<CertificateInfo>,
    /// Whether the presented chain verifies against the webpki roots.
    /// Informational only; the inspection itself never enforces trust.
    pub authorized: bool,
    pub authorization_error: Option<String>,
}

/// An HTTP header name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Presence check of one weighted security header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCheck {
    /// Lower-case header name.
    pub header: String,
    pub present: bool,
    pub weight: f64,
    pub value: Option<String>,
    /// Actionable recommendation when the header is missing.
    pub recommendation: Option<String>,
}

/// Security header score and letter grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGrade {
    pub grade: String,
    pub score: f64,
    pub max_score: f64,
    pub checks: Vec<SecurityCheck>,
}

/// Result of an HTTP header check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpHeaderGradeReport {
    pub url: String,
    /// Redirect responses that preceded the final one.
    pub redirects: Vec<RedirectHop>,
    pub final_url: String,
    pub final_status: u16,
    /// Final response headers, lower-case names.
    pub headers: BTreeMap<String, String>,
    pub security: SecurityGrade,
}

/// A PTR hostname and whether it resolves back to the queried address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseDnsHostname {
    pub hostname: String,
    pub forward_confirmed: bool,
}

/// Reverse DNS result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseDnsReport {
    pub ip: String,
    pub hostnames: Vec<ReverseDnsHostname>,
    pub count: usize,
}

/// Transport-level failure category of an HTTP fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    Timeout,
    Dns,
    ConnectionRefused,
    ConnectionReset,
    Ssl,
    Unknown,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Dns => write!(f, "dns"),
            Self::ConnectionRefused => write!(f, "connection_refused"),
            Self::ConnectionReset => write!(f, "connection_reset"),
            Self::Ssl => write!(f, "ssl"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Website liveness and certificate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteStatusReport {
    /// A status code was obtained and it is below 500.
    pub is_up: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Elapsed milliseconds of the liveness request(s).
    pub response_time: u64,
    /// Certificate verifies and is inside its validity window.
    pub ssl_valid: bool,
    pub ssl_days_remaining: Option<i64>,
    pub ssl_expiry: Option<String>,
    pub ssl_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<NetworkErrorKind>,
    /// Check time (RFC 3339, UTC).
    pub checked_at: String,
}

/// WHOIS query result with parsed registration fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisResult {
    /// The queried domain name.
    pub domain: String,
    /// Domain registrar (e.g. "Cloudflare, Inc.").
    pub registrar: Option<String>,
    /// Registration creation date.
    pub creation_date: Option<String>,
    /// Registration expiration date.
    pub expiration_date: Option<String>,
    /// Last updated date.
    pub updated_date: Option<String>,
    /// Authoritative name servers.
    pub name_servers: Vec<String>,
    /// EPP status codes.
    pub status: Vec<String>,
    /// Raw WHOIS response text.
    pub raw: String,
}
