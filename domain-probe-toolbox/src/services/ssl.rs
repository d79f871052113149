//! SSL/TLS certificate inspection module.
//!
//! Uses rustls with a verifier that accepts any chain so that expired,
//! self-signed and mismatched certificates can still be inspected. The
//! webpki verdict is recorded on the side and reported as `authorized`.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, trace, warn};
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::{ClientConfig, DigitallySignedStruct, ProtocolVersion, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::extensions::GeneralName;
use x509_parser::objects::{oid_registry, oid2abbrev};
use x509_parser::prelude::*;

use crate::config::TlsConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{CertificateInfo, CertificateReport};

const HTTPS_PORT: u16 = 443;
const SECONDS_PER_DAY: i64 = 86_400;

/// Verifier that accepts every certificate chain but remembers what webpki
/// thought of it. Handshake signatures are still checked.
#[derive(Debug)]
struct RecordingVerifier {
    webpki: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
    verdict: Mutex<Option<Result<(), String>>>,
}

impl RecordingVerifier {
    fn new(provider: Arc<CryptoProvider>) -> ToolboxResult<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let webpki = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| ToolboxError::NetworkError(format!("Failed to build verifier: {e}")))?;
        Ok(Self {
            webpki,
            provider,
            verdict: Mutex::new(None),
        })
    }

    fn take_verdict(&self) -> Result<(), String> {
        self.verdict
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| Err("Certificate was not verified".to_string()))
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verdict = self
            .webpki
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            .map(|_| ())
            .map_err(|e| e.to_string());
        if let Ok(mut slot) = self.verdict.lock() {
            *slot = Some(verdict);
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// What a completed handshake revealed about the peer.
struct TlsPeer {
    certs: Vec<CertificateDer<'static>>,
    protocol: Option<String>,
    verdict: Result<(), String>,
}

fn protocol_label(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1".to_string(),
        other => format!("{other:?}"),
    }
}

/// Connect and handshake with `host:port`. The stream is dropped on return.
async fn handshake(host: &str, port: u16) -> ToolboxResult<TlsPeer> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(RecordingVerifier::new(provider.clone())?);

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ToolboxError::NetworkError(format!("TLS configuration failed: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(verifier.clone())
        .with_no_client_auth();

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ToolboxError::ValidationError(format!("Invalid server name: {host}")))?;

    trace!("[SSL] Establishing TCP connection to {host}:{port}...");
    let stream = TcpStream::connect((host, port)).await.map_err(|e| {
        warn!("[SSL] TCP connection to {host} failed: {e}");
        ToolboxError::NetworkError(format!("Connection failed: {e}"))
    })?;

    trace!("[SSL] Performing TLS handshake...");
    let tls_stream = TlsConnector::from(Arc::new(config))
        .connect(server_name, stream)
        .await
        .map_err(|e| {
            warn!("[SSL] TLS handshake with {host} failed: {e}");
            ToolboxError::NetworkError(format!("TLS handshake failed: {e}"))
        })?;

    let (_, connection) = tls_stream.get_ref();
    let certs = connection
        .peer_certificates()
        .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
        .unwrap_or_default();
    let protocol = connection.protocol_version().map(protocol_label);

    Ok(TlsPeer {
        certs,
        protocol,
        verdict: verifier.take_verdict(),
    })
}

/// Handshake under the configured connect + handshake deadline.
async fn handshake_with_deadline(
    host: &str,
    port: u16,
    config: &TlsConfig,
) -> ToolboxResult<TlsPeer> {
    timeout(config.handshake_timeout(), handshake(host, port))
        .await
        .map_err(|_| {
            warn!("[SSL] Handshake with {host} timed out");
            ToolboxError::Timeout(format!(
                "TLS connection timed out ({}s)",
                config.handshake_timeout_secs
            ))
        })?
}

/// Distinguished name attributes keyed by their short name.
fn name_map(name: &X509Name<'_>) -> BTreeMap<String, String> {
    let registry = oid_registry();
    name.iter_attributes()
        .filter_map(|attr| {
            let value = attr.as_str().ok()?.to_string();
            let key = oid2abbrev(attr.attr_type(), registry)
                .map_or_else(|_| attr.attr_type().to_id_string(), str::to_string);
            Some((key, value))
        })
        .collect()
}

/// Colon-separated upper-case hex, as shown by browsers and OpenSSL.
fn colon_hex(bytes: &[u8]) -> String {
    let encoded = hex::encode_upper(bytes);
    encoded
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair))
        .collect::<Vec<_>>()
        .join(":")
}

fn asn1_to_utc(time: ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
}

/// Whole days from `now` until `not_after`, rounded down, so a certificate
/// that expired an hour ago reports `-1`.
fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

fn within_validity(not_before: &str, not_after: &str, now: DateTime<Utc>) -> bool {
    let parse = |s: &str| DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc));
    match (parse(not_before), parse(not_after)) {
        (Ok(from), Ok(to)) => from <= now && now <= to,
        _ => false,
    }
}

fn rfc3339(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Parse one DER certificate into [`CertificateInfo`].
fn parse_certificate(der: &[u8], protocol: Option<String>) -> ToolboxResult<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| ToolboxError::NetworkError(format!("Certificate parsing failed: {e}")))?;

    let not_before = asn1_to_utc(cert.validity().not_before);
    let not_after = asn1_to_utc(cert.validity().not_after);
    let days_remaining = not_after.map_or(0, |t| days_until(t, Utc::now()));

    let subject_alt_names = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(CertificateInfo {
        subject: name_map(cert.subject()),
        issuer: name_map(cert.issuer()),
        valid_from: rfc3339(not_before),
        valid_to: rfc3339(not_after),
        days_remaining,
        serial_number: cert.serial.to_str_radix(16).to_uppercase(),
        fingerprint: colon_hex(&Sha1::digest(der)),
        fingerprint256: colon_hex(&Sha256::digest(der)),
        subject_alt_names,
        protocol,
    })
}

/// Walk issuer links from the leaf (`certs[0]`) through the presented certificates.
///
/// Stops at a self-issued certificate, a missing issuer, a repeated serial
/// or `max_depth` links. The leaf itself is not part of the result.
pub(crate) fn walk_issuer_chain(
    certs: &[CertificateInfo],
    max_depth: usize,
) -> Vec<CertificateInfo> {
    let mut chain = Vec::new();
    let Some(leaf) = certs.first() else {
        return chain;
    };

    let mut seen: HashSet<&str> = HashSet::from([leaf.serial_number.as_str()]);
    let mut current = leaf;
    while chain.len() < max_depth {
        if current.subject == current.issuer {
            break;
        }
        let Some(next) = certs.iter().find(|c| c.subject == current.issuer) else {
            break;
        };
        if !seen.insert(next.serial_number.as_str()) {
            break;
        }
        chain.push(next.clone());
        current = next;
    }
    chain
}

pub(crate) async fn inspect_certificate_at(
    domain: &str,
    port: u16,
    config: &TlsConfig,
) -> ToolboxResult<CertificateReport> {
    debug!("[SSL] Inspecting certificate of {domain}:{port}");
    let start_time = std::time::Instant::now();

    let peer = handshake_with_deadline(domain, port, config).await?;

    let Some(leaf_der) = peer.certs.first() else {
        warn!("[SSL] {domain} presented no certificate");
        return Err(ToolboxError::NoCertificate(domain.to_string()));
    };
    let cert = parse_certificate(leaf_der.as_ref(), peer.protocol.clone())?;

    let mut presented = vec![cert.clone()];
    presented.extend(
        peer.certs
            .iter()
            .skip(1)
            .filter_map(|der| parse_certificate(der.as_ref(), None).ok()),
    );
    let chain = walk_issuer_chain(&presented, config.max_chain_depth);

    let (authorized, authorization_error) = match peer.verdict {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e)),
    };

    debug!(
        "[SSL] {domain}: authorized={authorized}, days_remaining={}, chain={}, took {:?}",
        cert.days_remaining,
        chain.len(),
        start_time.elapsed()
    );

    Ok(CertificateReport {
        domain: domain.to_string(),
        cert,
        chain,
        authorized,
        authorization_error,
    })
}

/// Inspect the certificate served on port 443.
pub async fn inspect_certificate(
    domain: &str,
    config: &TlsConfig,
) -> ToolboxResult<CertificateReport> {
    inspect_certificate_at(domain, HTTPS_PORT, config).await
}

/// Certificate validity summary used by the website status probe.
#[derive(Debug, Clone, Default)]
pub struct TlsSummary {
    /// Chain verifies and the leaf is inside its validity window.
    pub valid: bool,
    pub days_remaining: Option<i64>,
    pub expiry: Option<String>,
    pub error: Option<String>,
}

pub(crate) async fn tls_summary_at(host: &str, port: u16, config: &TlsConfig) -> TlsSummary {
    let peer = match handshake_with_deadline(host, port, config).await {
        Ok(peer) => peer,
        Err(e) => {
            return TlsSummary {
                error: Some(e.to_string()),
                ..TlsSummary::default()
            };
        }
    };

    let Some(leaf) = peer
        .certs
        .first()
        .and_then(|der| parse_certificate(der.as_ref(), None).ok())
    else {
        return TlsSummary {
            error: Some(format!("No certificate presented by {host}")),
            ..TlsSummary::default()
        };
    };

    let in_window = within_validity(&leaf.valid_from, &leaf.valid_to, Utc::now());

    TlsSummary {
        valid: peer.verdict.is_ok() && in_window,
        days_remaining: Some(leaf.days_remaining),
        expiry: Some(leaf.valid_to),
        error: peer.verdict.err(),
    }
}

/// Simplified certificate check of `host` on port 443.
pub async fn tls_summary(host: &str, config: &TlsConfig) -> TlsSummary {
    tls_summary_at(host, HTTPS_PORT, config).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::TimeDelta;
    use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa};
    use rustls::ServerConfig;
    use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    use super::*;

    fn ca(name: &str) -> Certificate {
        let mut params = CertificateParams::new(Vec::new());
        params.distinguished_name.push(DnType::CommonName, name);
        params.distinguished_name.push(DnType::OrganizationName, "Probe Test");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        Certificate::from_params(params).unwrap()
    }

    fn leaf(host: &str) -> Certificate {
        let mut params = CertificateParams::new(vec![host.to_string()]);
        params.distinguished_name.push(DnType::CommonName, host);
        Certificate::from_params(params).unwrap()
    }

    fn info(subject: &str, issuer: &str, serial: &str) -> CertificateInfo {
        CertificateInfo {
            subject: BTreeMap::from([("CN".to_string(), subject.to_string())]),
            issuer: BTreeMap::from([("CN".to_string(), issuer.to_string())]),
            valid_from: String::new(),
            valid_to: String::new(),
            days_remaining: 30,
            serial_number: serial.to_string(),
            fingerprint: String::new(),
            fingerprint256: String::new(),
            subject_alt_names: Vec::new(),
            protocol: None,
        }
    }

    // ==================== formatting tests ====================

    #[test]
    fn test_colon_hex() {
        assert_eq!(colon_hex(&[0x0a, 0xff, 0x00]), "0A:FF:00");
        assert_eq!(colon_hex(&[]), "");
    }

    #[test]
    fn test_days_until_rounds_down() {
        let now = Utc::now();
        assert_eq!(days_until(now - TimeDelta::hours(12), now), -1);
        assert_eq!(days_until(now - TimeDelta::days(3), now), -3);
        assert_eq!(days_until(now + TimeDelta::hours(12), now), 0);
        assert_eq!(days_until(now + TimeDelta::hours(36), now), 1);
    }

    #[test]
    fn test_within_validity_uses_exact_expiry() {
        let now = Utc::now();
        let at = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let from = at(now - TimeDelta::days(90));

        assert!(within_validity(&from, &at(now + TimeDelta::hours(1)), now));
        // Expired twelve hours ago: same calendar-day distance, still invalid.
        assert!(!within_validity(&from, &at(now - TimeDelta::hours(12)), now));
        let not_yet = at(now + TimeDelta::days(1));
        assert!(!within_validity(&not_yet, &at(now + TimeDelta::days(2)), now));
        assert!(!within_validity("", "", now));
    }

    #[test]
    fn test_protocol_label() {
        assert_eq!(protocol_label(ProtocolVersion::TLSv1_3), "TLSv1.3");
        assert_eq!(protocol_label(ProtocolVersion::TLSv1_2), "TLSv1.2");
    }

    // ==================== parse_certificate tests ====================

    #[test]
    fn test_parse_self_signed_certificate() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let der = cert.serialize_der().unwrap();

        let parsed = parse_certificate(&der, Some("TLSv1.3".to_string())).unwrap();

        assert_eq!(parsed.subject, parsed.issuer);
        assert_eq!(parsed.subject_alt_names, vec!["localhost"]);
        assert_eq!(parsed.fingerprint.len(), 20 * 3 - 1);
        assert_eq!(parsed.fingerprint256.len(), 32 * 3 - 1);
        assert!(parsed.valid_from.ends_with('Z'));
        assert!(parsed.days_remaining > 0);
        assert_eq!(parsed.protocol.as_deref(), Some("TLSv1.3"));
        assert!(!parsed.serial_number.is_empty());
        assert_eq!(parsed.serial_number, parsed.serial_number.to_uppercase());
    }

    #[test]
    fn test_parse_uses_short_attribute_names() {
        let authority = ca("Probe Root");
        let der = authority.serialize_der().unwrap();
        let parsed = parse_certificate(&der, None).unwrap();
        assert_eq!(parsed.subject.get("CN").map(String::as_str), Some("Probe Root"));
        assert_eq!(parsed.subject.get("O").map(String::as_str), Some("Probe Test"));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_certificate(b"not a certificate", None).is_err());
    }

    // ==================== walk_issuer_chain tests ====================

    #[test]
    fn test_self_issued_leaf_has_empty_chain() {
        let certs = vec![info("self", "self", "01")];
        assert!(walk_issuer_chain(&certs, 10).is_empty());
    }

    #[test]
    fn test_chain_follows_issuer_links_out_of_order() {
        let certs = vec![
            info("www.example.com", "Intermediate", "01"),
            info("Root", "Root", "03"),
            info("Intermediate", "Root", "02"),
        ];
        let chain = walk_issuer_chain(&certs, 10);
        let subjects: Vec<&str> = chain.iter().map(|c| c.subject["CN"].as_str()).collect();
        assert_eq!(subjects, vec!["Intermediate", "Root"]);
    }

    #[test]
    fn test_chain_stops_at_missing_issuer() {
        let certs = vec![info("leaf", "Missing CA", "01"), info("Other", "Other", "02")];
        assert!(walk_issuer_chain(&certs, 10).is_empty());
    }

    #[test]
    fn test_chain_stops_on_repeated_serial() {
        // Two CAs issuing each other form a cycle.
        let certs = vec![
            info("leaf", "CA-1", "01"),
            info("CA-1", "CA-2", "02"),
            info("CA-2", "CA-1", "03"),
        ];
        let chain = walk_issuer_chain(&certs, 10);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_chain_depth_cap() {
        let mut certs = vec![info("leaf", "CA-0", "leaf")];
        for i in 0..15 {
            certs.push(info(&format!("CA-{i}"), &format!("CA-{}", i + 1), &format!("{i:02X}")));
        }
        assert_eq!(walk_issuer_chain(&certs, 10).len(), 10);
    }

    #[test]
    fn test_chain_from_real_certificates() {
        let authority = ca("Probe Intermediate");
        let host = leaf("www.probe.test");
        let leaf_der = host.serialize_der_with_signer(&authority).unwrap();
        let ca_der = authority.serialize_der().unwrap();

        let presented = vec![
            parse_certificate(&leaf_der, None).unwrap(),
            parse_certificate(&ca_der, None).unwrap(),
        ];
        let chain = walk_issuer_chain(&presented, 10);

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].subject["CN"], "Probe Intermediate");
        assert_eq!(presented[0].issuer, chain[0].subject);
    }

    // ==================== handshake tests ====================

    /// Serve one TLS handshake on a random loopback port with a self-signed
    /// certificate for `localhost`.
    async fn serve_self_signed() -> u16 {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key)
        .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            if let Ok(mut tls) = acceptor.accept(tcp).await {
                let mut buf = [0u8; 1];
                let _ = tls.read(&mut buf).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_inspect_untrusted_certificate_still_reported() {
        let port = serve_self_signed().await;
        let report = inspect_certificate_at("localhost", port, &TlsConfig::default())
            .await
            .unwrap();

        assert_eq!(report.domain, "localhost");
        assert!(!report.authorized);
        assert!(report.authorization_error.is_some());
        assert!(report.chain.is_empty());
        assert_eq!(report.cert.subject_alt_names, vec!["localhost"]);
        assert_eq!(report.cert.protocol.as_deref(), Some("TLSv1.3"));
    }

    #[tokio::test]
    async fn test_tls_summary_untrusted_is_invalid() {
        let port = serve_self_signed().await;
        let summary = tls_summary_at("localhost", port, &TlsConfig::default()).await;
        assert!(!summary.valid);
        assert!(summary.days_remaining.unwrap() > 0);
        assert!(summary.error.is_some());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = inspect_certificate_at("127.0.0.1", port, &TlsConfig::default()).await;
        assert!(matches!(result, Err(ToolboxError::NetworkError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_times_out() {
        // Accepts TCP but never answers the ClientHello.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });

        let result = inspect_certificate_at("127.0.0.1", port, &TlsConfig::default()).await;
        assert!(matches!(result, Err(ToolboxError::Timeout(_))));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_inspect_certificate_real() {
        let report = inspect_certificate("google.com", &TlsConfig::default())
            .await
            .unwrap_or_else(|e| panic!("SSL check failed: {e}"));
        assert!(report.authorized);
        assert!(report.cert.days_remaining > 0);
        assert!(!report.cert.subject_alt_names.is_empty());
        assert!(!report.chain.is_empty());
    }
}
