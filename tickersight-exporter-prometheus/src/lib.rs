//! Prometheus exporter for cryptocurrency exchange tickers.
//!
//! Every scrape of the metrics endpoint runs one collection cycle against the
//! exchange REST API and renders the result. Nothing is cached between scrapes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Exchange API   │<────│    Collector    │<────│   HTTP Server   │
//! │ (symbols/ticker)│     │  (one cycle)    │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! tickersight-exporter-prometheus --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod catalog;
pub mod collector;
pub mod config;
pub mod exchange;
pub mod http;
pub mod mapping;

#[cfg(test)]
mod testing;

pub use catalog::{MetricCatalog, MetricDescriptor, MetricKind};
pub use collector::{CycleReport, MetricSample, SharedCollector, TickerCollector};
pub use config::ExporterConfig;
pub use exchange::{ExchangeApi, ExchangeClient, ExchangeError};
pub use http::HttpServer;
