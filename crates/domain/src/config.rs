//! Integration configuration structures
//!
//! Loaded by `carelink_infra::config` from environment variables or a
//! JSON/TOML file. The gateway's own server-held secret never appears here.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::CHANNEL_PATH;
use crate::errors::{CareLinkError, Result};

/// Top-level configuration for one integration instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Proxy gateway endpoint (sign-in, fallback key and GraphQL passthrough)
    pub gateway_url: String,
    /// Persistent channel base URL; derived from the gateway host when absent
    #[serde(default)]
    pub channel_url: Option<String>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per request (initial try + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    /// Absent: keep the last known list for the lifetime of the session
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_backoff_ms() -> u64 {
    200
}

fn default_cache_capacity() -> u64 {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_capacity: default_cache_capacity(), ttl_secs: None }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

impl IntegrationConfig {
    /// Configuration with defaults for everything but the gateway endpoint.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            channel_url: None,
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Override the persistent channel endpoint.
    pub fn with_channel_url(mut self, channel_url: impl Into<String>) -> Self {
        self.channel_url = Some(channel_url.into());
        self
    }

    /// Check endpoints and limits.
    ///
    /// # Errors
    /// Returns `CareLinkError::Config` for an empty or non-http(s) gateway
    /// URL, a non-ws(s) channel URL, or zero attempts/capacity.
    pub fn validate(&self) -> Result<()> {
        let gateway = parse_url("gateway_url", &self.gateway_url)?;
        if !matches!(gateway.scheme(), "http" | "https") {
            return Err(CareLinkError::Config(format!(
                "gateway_url must use http or https, got '{}'",
                gateway.scheme()
            )));
        }

        let channel = parse_url("channel_url", &self.resolved_channel_url()?)?;
        if !matches!(channel.scheme(), "ws" | "wss") {
            return Err(CareLinkError::Config(format!(
                "channel_url must use ws or wss, got '{}'",
                channel.scheme()
            )));
        }

        if self.http.max_attempts == 0 {
            return Err(CareLinkError::Config("http.max_attempts must be at least 1".into()));
        }
        if self.cache.max_capacity == 0 {
            return Err(CareLinkError::Config("cache.max_capacity must be at least 1".into()));
        }

        Ok(())
    }

    /// The persistent channel base URL.
    ///
    /// Uses `channel_url` when set; otherwise `wss://<gateway host>/subscriptions`
    /// (`ws://` for a plain-http gateway).
    ///
    /// # Errors
    /// Returns `CareLinkError::Config` when the gateway URL cannot be parsed.
    pub fn resolved_channel_url(&self) -> Result<String> {
        if let Some(explicit) = self.channel_url.as_deref().filter(|url| !url.trim().is_empty()) {
            return Ok(explicit.trim().to_string());
        }

        let gateway = parse_url("gateway_url", &self.gateway_url)?;
        let host = gateway.host_str().ok_or_else(|| {
            CareLinkError::Config(format!("gateway_url has no host: {}", self.gateway_url))
        })?;
        let scheme = if gateway.scheme() == "http" { "ws" } else { "wss" };
        let authority = match gateway.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(format!("{scheme}://{authority}{CHANNEL_PATH}"))
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CareLinkError::Config(format!("{field} is empty")));
    }
    Url::parse(trimmed)
        .map_err(|e| CareLinkError::Config(format!("{field} is not a valid URL ({trimmed}): {e}")))
}
