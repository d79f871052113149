//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Toolbox error type.
///
/// Only whole-probe failures surface here. Failures of individual fan-out
/// items (one record type, one TLD, one label, one resolver) are folded into
/// the probe report instead.
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ToolboxError {
    /// Malformed input; no network I/O was attempted.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The probe exceeded its overall deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The DNS server answered with a failure (SERVFAIL, REFUSED, ...).
    #[error("DNS server failure: {0}")]
    DnsServerFailure(String),

    /// Connection, TLS or protocol failure talking to the target.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The TLS handshake completed but the peer presented no certificate.
    #[error("No certificate presented by {0}")]
    NoCertificate(String),
}

impl ToolboxError {
    /// Whether this is an expected outcome (bad input, unreachable target) rather
    /// than a fault, used to pick the log level.
    ///
    /// `true` should be logged at `warn`, `false` at `error`.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ValidationError(_) | Self::Timeout(_) | Self::NoCertificate(_) => true,
            Self::DnsServerFailure(_) | Self::NetworkError(_) => false,
        }
    }

    /// Machine-readable tag for programmatic branching by API clients.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation",
            Self::Timeout(_) => "timeout",
            Self::DnsServerFailure(_) => "dns_server_failure",
            Self::NetworkError(_) => "network",
            Self::NoCertificate(_) => "no_certificate",
        }
    }
}

/// Toolbox Result type alias
pub type ToolboxResult<T> = std::result::Result<T, ToolboxError>;
