use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use domain_probe_toolbox::ToolboxService;
use domain_probe_web::config::WebConfig;
use domain_probe_web::rate_limit::{FixedWindowLimiter, RateLimiter, Unlimited};
use domain_probe_web::{AppState, configure, logging};

/// How often ended rate limit windows are dropped.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = WebConfig::load()?;
    logging::init(&config.logging)?;

    let toolbox = ToolboxService::new(config.probes.clone()).context("failed to build toolbox")?;

    let limiter: Arc<dyn RateLimiter> = if config.rate_limit.enabled {
        let limiter = Arc::new(FixedWindowLimiter::new(config.rate_limit.window()));
        let purger = Arc::clone(&limiter);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                purger.purge_expired();
            }
        });
        limiter
    } else {
        tracing::warn!("Rate limiting is disabled");
        Arc::new(Unlimited)
    };

    let state = web::Data::new(AppState {
        toolbox: Arc::new(toolbox),
        limiter,
        rate_limit: config.rate_limit.clone(),
        trust_forwarded_for: config.server.trust_forwarded_for,
    });

    let workers = config.server.worker_count();
    tracing::info!(
        bind = %config.server.bind,
        workers,
        version = env!("CARGO_PKG_VERSION"),
        "Starting domain probe API"
    );

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| configure(cfg, state))
    })
    .workers(workers)
    .bind(&config.server.bind)
    .with_context(|| format!("failed to bind {}", config.server.bind))?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
