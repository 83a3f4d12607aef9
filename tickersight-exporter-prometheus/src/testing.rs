//! In-memory exchange used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tickersight_common::{SymbolSet, TickerResponse};

use crate::exchange::{ExchangeApi, ExchangeError};

/// Exchange double: symbols without a registered ticker fail with HTTP 503.
#[derive(Default)]
pub struct MockExchange {
    symbols: Option<Vec<String>>,
    tickers: HashMap<String, TickerResponse>,
    delay: Duration,
    ticker_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExchange {
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: Some(symbols.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn failing_discovery() -> Self {
        Self::default()
    }

    pub fn with_ticker(mut self, symbol: &str, ticker: TickerResponse) -> Self {
        self.tickers.insert(symbol.to_string(), ticker);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ticker for BTCUSD as published by the exchange docs.
    pub fn full_ticker() -> TickerResponse {
        TickerResponse {
            symbol: Some("BTCUSD".into()),
            open: Some("9121.76".into()),
            high: Some("9440.66".into()),
            low: Some("9106.51".into()),
            close: Some("9347.66".into()),
            bid: Some("9345.70".into()),
            ask: Some("9347.67".into()),
        }
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn unavailable(path: &str) -> ExchangeError {
    ExchangeError::Status {
        url: format!("mock://exchange/{}", path),
        status: StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn fetch_symbols(&self) -> Result<SymbolSet, ExchangeError> {
        self.enter().await;
        let result = match &self.symbols {
            Some(symbols) => Ok(SymbolSet::new(symbols.clone())),
            None => Err(unavailable("v1/symbols")),
        };
        self.exit();
        result
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<TickerResponse, ExchangeError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = self
            .tickers
            .get(symbol)
            .cloned()
            .ok_or_else(|| unavailable(&format!("v2/ticker/{}", symbol)));
        self.exit();
        result
    }
}
