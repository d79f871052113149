//! Server configuration.
//!
//! Loaded from a TOML file (`DOMAIN_PROBE_CONFIG`, else `config.toml`); a
//! missing file means defaults. `DOMAIN_PROBE_BIND` and `DOMAIN_PROBE_LOG`
//! override the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use domain_probe_toolbox::ProbeConfig;
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "DOMAIN_PROBE_CONFIG";
const BIND_ENV: &str = "DOMAIN_PROBE_BIND";
const LOG_ENV: &str = "DOMAIN_PROBE_LOG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub probes: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Worker threads; `None` uses one per CPU.
    pub workers: Option<usize>,
    /// Take the client address from `X-Forwarded-For` / `Forwarded`.
    /// Only enable behind a proxy that sets these headers.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            workers: None,
            trust_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Fixed-window request budgets per client and route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_secs: u64,
    /// Budget for routes without an entry in `routes`.
    pub default_limit: u32,
    /// Route name (e.g. `subdomains`) -> requests per window.
    pub routes: BTreeMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let routes = [
            ("dns-lookup", 30),
            ("reverse-dns", 30),
            ("dns-propagation", 20),
            ("redirect-trace", 20),
            ("http-headers", 20),
            ("ssl-certificate", 20),
            ("website-status", 20),
            ("domain-availability", 10),
            ("subdomains", 10),
            ("whois", 10),
        ]
        .into_iter()
        .map(|(route, limit)| (route.to_string(), limit))
        .collect();

        Self {
            enabled: true,
            window_secs: 60,
            default_limit: 30,
            routes,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }

    pub fn limit_for(&self, route: &str) -> u32 {
        self.routes.get(route).copied().unwrap_or(self.default_limit)
    }
}

impl WebConfig {
    /// Load from the configured path and apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse `path`, or return defaults when it does not exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = var(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.server.bind = bind;
        }
        if let Some(level) = var(LOG_ENV).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level;
        }
    }
}
