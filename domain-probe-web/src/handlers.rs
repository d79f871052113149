//! Route handlers.
//!
//! Every tool route takes a JSON body, spends one unit of the client's budget
//! for that route, runs exactly one probe and returns its report as JSON.

use actix_web::error::JsonPayloadError;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::rate_limit::{Decision, retry_after_secs};

type ApiResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Deserialize)]
pub struct DomainBody {
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct PropagationBody {
    #[serde(default)]
    pub domain: String,
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrlBody {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct IpBody {
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Non-empty trimmed field value, or a 400 naming the field.
fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

/// Client address used as the rate limit key.
fn client_key(req: &HttpRequest, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for && let Some(ip) = req.connection_info().realip_remote_addr() {
        return ip.to_string();
    }
    req.peer_addr()
        .map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Spend one request of `route`'s budget for this client.
fn admit(state: &AppState, req: &HttpRequest, route: &'static str) -> Result<(), ApiError> {
    let client = client_key(req, state.trust_forwarded_for);
    let limit = state.rate_limit.limit_for(route);
    match state.limiter.check(&format!("{route}:{client}"), limit) {
        Decision::Allowed { .. } => Ok(()),
        Decision::Limited { retry_after } => Err(ApiError::RateLimited {
            retry_after_secs: retry_after_secs(retry_after),
        }),
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid JSON body: {err}")).into()
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tracing::instrument(skip_all, fields(domain = %body.domain))]
pub async fn dns_lookup(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DomainBody>,
) -> ApiResult {
    admit(&state, &req, "dns-lookup")?;
    let domain = required("domain", &body.domain)?;
    let report = state.toolbox.dns_lookup(domain).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(domain = %body.domain))]
pub async fn dns_propagation(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<PropagationBody>,
) -> ApiResult {
    admit(&state, &req, "dns-propagation")?;
    let domain = required("domain", &body.domain)?;
    let report = state
        .toolbox
        .dns_propagation_check(domain, body.record_type.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(domain = %body.domain))]
pub async fn domain_availability(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DomainBody>,
) -> ApiResult {
    admit(&state, &req, "domain-availability")?;
    let name = required("domain", &body.domain)?;
    let report = state.toolbox.domain_availability(name).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// The probe is cancelled by dropping it, which actix does when the client
/// goes away, so no token is passed.
#[tracing::instrument(skip_all, fields(domain = %body.domain))]
pub async fn subdomains(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DomainBody>,
) -> ApiResult {
    admit(&state, &req, "subdomains")?;
    let domain = required("domain", &body.domain)?;
    let report = state.toolbox.enumerate_subdomains(domain, None).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(url = %body.url))]
pub async fn redirect_trace(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UrlBody>,
) -> ApiResult {
    admit(&state, &req, "redirect-trace")?;
    let url = required("url", &body.url)?;
    let report = state.toolbox.trace_redirects(url).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(domain = %body.domain))]
pub async fn ssl_certificate(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DomainBody>,
) -> ApiResult {
    admit(&state, &req, "ssl-certificate")?;
    let domain = required("domain", &body.domain)?;
    let report = state.toolbox.inspect_certificate(domain).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(url = %body.url))]
pub async fn http_headers(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UrlBody>,
) -> ApiResult {
    admit(&state, &req, "http-headers")?;
    let url = required("url", &body.url)?;
    let report = state.toolbox.http_header_check(url).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(ip = %body.ip))]
pub async fn reverse_dns(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<IpBody>,
) -> ApiResult {
    admit(&state, &req, "reverse-dns")?;
    let ip = required("ip", &body.ip)?;
    let report = state.toolbox.reverse_dns(ip).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(url = %body.url))]
pub async fn website_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UrlBody>,
) -> ApiResult {
    admit(&state, &req, "website-status")?;
    let url = required("url", &body.url)?;
    let report = state.toolbox.website_status(url).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip_all, fields(domain = %body.domain))]
pub async fn whois(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DomainBody>,
) -> ApiResult {
    admit(&state, &req, "whois")?;
    let domain = required("domain", &body.domain)?;
    let report = state.toolbox.whois_lookup(domain).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_required_trims() {
        assert!(matches!(
            required("domain", "  "),
            Err(ApiError::BadRequest(m)) if m == "domain is required"
        ));
        assert!(matches!(required("domain", " a.com "), Ok("a.com")));
    }

    #[test]
    fn test_client_key_ignores_forwarded_by_default() {
        let req = TestRequest::default()
            .peer_addr("10.0.0.1:5000".parse().unwrap())
            .insert_header(("x-forwarded-for", "203.0.113.9"))
            .to_http_request();

        assert_eq!(client_key(&req, false), "10.0.0.1");
        assert_eq!(client_key(&req, true), "203.0.113.9");
    }

    #[test]
    fn test_client_key_without_peer() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(client_key(&req, false), "unknown");
    }
}
