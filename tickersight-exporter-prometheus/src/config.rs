//! Configuration for the Prometheus exporter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tickersight_common::LoggingConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Upstream exchange settings.
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Collection cycle settings.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Symbol filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Exchange REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL of the REST API (default: "https://api.gemini.com/").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds, covering connect and body.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User-Agent header sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://api.gemini.com/".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    concat!("tickersight/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9141").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Default labels to add to all metrics.
    #[serde(default)]
    pub default_labels: HashMap<String, String>,

    /// Metric name prefix (default: "crypto").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:9141".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "crypto".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            default_labels: HashMap::new(),
            prefix: default_prefix(),
        }
    }
}

/// Collection cycle configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Serialize concurrent scrapes so only one cycle hits the exchange at a time.
    #[serde(default)]
    pub single_flight: bool,
}

/// Symbol filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for symbols to include (empty = all).
    #[serde(default)]
    pub include_symbols: Vec<String>,

    /// Glob patterns for symbols to exclude.
    #[serde(default)]
    pub exclude_symbols: Vec<String>,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match reqwest::Url::parse(&self.exchange.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "Invalid exchange base_url: {}",
                    self.exchange.base_url
                )));
            }
        }

        if self.exchange.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.exchange.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }

        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if !is_valid_metric_prefix(&self.prometheus.prefix) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric prefix: {:?}",
                self.prometheus.prefix
            )));
        }

        for name in self.prometheus.default_labels.keys() {
            if !is_valid_label_name(name) {
                return Err(ConfigError::Validation(format!(
                    "Invalid default label name: {:?}",
                    name
                )));
            }
            if name == crate::catalog::CURRENCY_LABEL {
                return Err(ConfigError::Validation(format!(
                    "Default label {:?} collides with the per-symbol label",
                    name
                )));
            }
        }

        for pattern in self
            .filters
            .include_symbols
            .iter()
            .chain(&self.filters.exclude_symbols)
        {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "Invalid symbol pattern {:?}: {}",
                    pattern, e
                )));
            }
        }

        Ok(())
    }
}

/// Metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn is_valid_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Label names must match `[a-zA-Z_][a-zA-Z0-9_]*` and must not start with `__`.
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
