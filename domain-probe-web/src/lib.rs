//! JSON API over [`domain_probe_toolbox`].
//!
//! `POST /api/tools/<name>` runs one probe per request; `GET /health` reports
//! liveness.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod rate_limit;

use std::sync::Arc;

use actix_web::web;
use domain_probe_toolbox::ToolboxService;

use config::RateLimitConfig;
use rate_limit::RateLimiter;

/// Largest accepted JSON body.
const JSON_LIMIT: usize = 16 * 1024;

/// Shared application state.
pub struct AppState {
    pub toolbox: Arc<ToolboxService>,
    pub limiter: Arc<dyn RateLimiter>,
    pub rate_limit: RateLimitConfig,
    pub trust_forwarded_for: bool,
}

/// Register the API routes on an actix app.
pub fn configure(cfg: &mut web::ServiceConfig, state: web::Data<AppState>) {
    cfg.app_data(state)
        .app_data(
            web::JsonConfig::default()
                .limit(JSON_LIMIT)
                .error_handler(handlers::json_error_handler),
        )
        .route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/api/tools")
                .route("/dns-lookup", web::post().to(handlers::dns_lookup))
                .route("/dns-propagation", web::post().to(handlers::dns_propagation))
                .route(
                    "/domain-availability",
                    web::post().to(handlers::domain_availability),
                )
                .route("/subdomains", web::post().to(handlers::subdomains))
                .route("/redirect-trace", web::post().to(handlers::redirect_trace))
                .route("/ssl-certificate", web::post().to(handlers::ssl_certificate))
                .route("/http-headers", web::post().to(handlers::http_headers))
                .route("/reverse-dns", web::post().to(handlers::reverse_dns))
                .route("/website-status", web::post().to(handlers::website_status))
                .route("/whois", web::post().to(handlers::whois)),
        );
}
