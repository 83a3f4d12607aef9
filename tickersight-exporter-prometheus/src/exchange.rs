//! Exchange REST API client.
//!
//! Two endpoints are used:
//!
//! - `GET {base}/v1/symbols`: JSON array of symbol strings
//! - `GET {base}/v2/ticker/{symbol}`: ticker object with string-typed prices
//!
//! Every call is a fresh round-trip: no retries, no caching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tickersight_common::{SymbolSet, TickerResponse};
use tracing::trace;

use crate::config::ExchangeConfig;

/// Errors returned by the exchange client.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Transport-level failure (DNS, connect, TLS, timeout, body read).
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The exchange answered with a non-success status.
    #[error("Exchange returned HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },

    /// The response body did not have the expected JSON shape.
    #[error("Unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: tickersight_common::Error,
    },

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to build the HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ExchangeError {
    /// Whether the failure happened below HTTP (connect, TLS, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, ExchangeError::Request { .. })
    }

    /// Whether the request hit the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::Request { source, .. } if source.is_timeout())
    }
}

/// Read access to the exchange's public market data.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Fetch the currently tradable symbols.
    async fn fetch_symbols(&self) -> Result<SymbolSet, ExchangeError>;

    /// Fetch the ticker of one symbol.
    async fn fetch_ticker(&self, symbol: &str) -> Result<TickerResponse, ExchangeError>;
}

/// HTTP client for the exchange REST API.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    client: Client,
    base_url: Url,
}

impl ExchangeClient {
    /// Create a client with explicit timeouts.
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ExchangeError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ExchangeError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ExchangeError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(ExchangeError::Client)?;

        Ok(Self { client, base_url })
    }

    /// Create a client from the exporter configuration.
    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
            &config.user_agent,
        )
    }

    /// Base URL of the exchange.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL.
    ///
    /// Each segment is percent-encoded, so a symbol cannot escape its position
    /// in the path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ExchangeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ExchangeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a URL and return the body of a successful response.
    async fn get(&self, url: Url) -> Result<Vec<u8>, ExchangeError> {
        trace!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ExchangeError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ExchangeError::Request {
                url: url.to_string(),
                source,
            })?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl ExchangeApi for ExchangeClient {
    async fn fetch_symbols(&self) -> Result<SymbolSet, ExchangeError> {
        let url = self.endpoint(&["v1", "symbols"])?;
        let body = self.get(url.clone()).await?;

        SymbolSet::from_json(&body).map_err(|source| ExchangeError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<TickerResponse, ExchangeError> {
        let url = self.endpoint(&["v2", "ticker", symbol])?;
        let body = self.get(url.clone()).await?;

        TickerResponse::from_json(&body).map_err(|source| ExchangeError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ExchangeClient {
        ExchangeClient::new(
            base,
            Duration::from_secs(1),
            Duration::from_secs(1),
            "tickersight-test",
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let client = client("https://api.gemini.com/");
        let url = client.endpoint(&["v1", "symbols"]).unwrap();
        assert_eq!(url.as_str(), "https://api.gemini.com/v1/symbols");
    }

    #[test]
    fn test_endpoint_without_trailing_slash() {
        let client = client("https://api.gemini.com");
        let url = client.endpoint(&["v2", "ticker", "btcusd"]).unwrap();
        assert_eq!(url.as_str(), "https://api.gemini.com/v2/ticker/btcusd");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("http://127.0.0.1:8080/proxy/gemini/");
        let url = client.endpoint(&["v1", "symbols"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/proxy/gemini/v1/symbols");
    }

    #[test]
    fn test_endpoint_escapes_symbol() {
        let client = client("https://api.gemini.com/");
        let url = client.endpoint(&["v2", "ticker", "../v1/x?y"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.gemini.com/v2/ticker/..%2Fv1%2Fx%3Fy"
        );
    }

    #[test]
    fn test_from_config_normalizes_base_url() {
        let config = ExchangeConfig {
            base_url: "https://api.gemini.com".to_string(),
            ..ExchangeConfig::default()
        };
        let client = ExchangeClient::from_config(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.gemini.com/");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ExchangeClient::new(
            "mailto:ops@example.com",
            Duration::from_secs(1),
            Duration::from_secs(1),
            "ua",
        );
        assert!(matches!(result, Err(ExchangeError::InvalidUrl(_))));

        let result = ExchangeClient::new(
            "not a url",
            Duration::from_secs(1),
            Duration::from_secs(1),
            "ua",
        );
        assert!(matches!(result, Err(ExchangeError::InvalidUrl(_))));
    }

    #[test]
    fn test_error_classification() {
        let err = ExchangeError::Status {
            url: "https://api.gemini.com/v1/symbols".into(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(!err.is_transport());
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("502"));
    }
}
