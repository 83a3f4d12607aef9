//! Collection cycle: symbol discovery followed by one ticker fetch per symbol.
//!
//! A cycle never fails as a whole. Discovery failure yields a single `up = 0`
//! sample; a failed ticker fetch drops that symbol only; a malformed price drops
//! that field only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tickersight_common::{PriceField, SymbolSet, TickerSnapshot};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::catalog::{MetricCatalog, MetricKind};
use crate::config::{CollectionConfig, FilterConfig};
use crate::exchange::{ExchangeApi, ExchangeError};

/// One gauge value produced by a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub kind: MetricKind,
    /// Symbol label; `None` for `up`.
    pub symbol: Option<String>,
    pub value: f64,
}

impl MetricSample {
    fn up(success: bool) -> Self {
        Self {
            kind: MetricKind::Up,
            symbol: None,
            value: if success { 1.0 } else { 0.0 },
        }
    }

    fn price(symbol: &str, field: PriceField, value: f64) -> Self {
        Self {
            kind: MetricKind::Price(field),
            symbol: Some(symbol.to_string()),
            value,
        }
    }
}

/// A symbol whose ticker could not be fetched.
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: ExchangeError,
}

/// Outcome of one collection cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Samples in emission order: `up` first, then prices in discovery order.
    pub samples: Vec<MetricSample>,
    /// Discovery error, if the cycle failed.
    pub discovery_error: Option<ExchangeError>,
    /// Symbols returned by discovery, before filtering.
    pub symbols_discovered: usize,
    /// Repeated symbols dropped from discovery.
    pub symbols_duplicate: usize,
    /// Symbols removed by the configured filters.
    pub symbols_filtered: usize,
    /// Ticker fetches attempted.
    pub tickers_attempted: usize,
    /// Tickers that could not be fetched.
    pub symbol_failures: Vec<SymbolFailure>,
    /// Price fields omitted because they were missing or malformed.
    pub field_rejections: usize,
    /// Wall time of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    /// Whether symbol discovery succeeded.
    pub fn is_up(&self) -> bool {
        self.discovery_error.is_none()
    }

    /// Price samples for one symbol.
    pub fn samples_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a MetricSample> {
        self.samples
            .iter()
            .filter(move |s| s.symbol.as_deref() == Some(symbol))
    }
}

/// Filter applied to discovered symbols.
pub struct SymbolFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl SymbolFilter {
    /// Create a new filter from configuration.
    ///
    /// Invalid patterns are skipped; configuration validation rejects them earlier.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect()
        };

        Self {
            include: compile(&config.include_symbols),
            exclude: compile(&config.exclude_symbols),
        }
    }

    /// Check if a symbol should be collected.
    pub fn should_include(&self, symbol: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(symbol)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(symbol))
    }
}

impl Default for SymbolFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// Collector statistics, accumulated over the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Cycles run.
    pub cycles: u64,
    /// Cycles whose symbol discovery failed.
    pub cycles_failed: u64,
    /// Ticker fetches that failed.
    pub ticker_failures: u64,
    /// Price fields omitted because they did not parse.
    pub field_parse_failures: u64,
    /// Duration of the most recent cycle.
    pub last_cycle_duration: Duration,
}

/// Runs collection cycles against an exchange.
pub struct TickerCollector {
    exchange: Arc<dyn ExchangeApi>,
    catalog: Arc<MetricCatalog>,
    filter: SymbolFilter,
    /// Present when single-flight is enabled.
    cycle_lock: Option<Mutex<()>>,
    stats: RwLock<CollectorStats>,
}

impl TickerCollector {
    /// Create a new collector.
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        catalog: Arc<MetricCatalog>,
        collection_config: &CollectionConfig,
        filter_config: &FilterConfig,
    ) -> Self {
        Self {
            exchange,
            catalog,
            filter: SymbolFilter::new(filter_config),
            cycle_lock: collection_config.single_flight.then(|| Mutex::new(())),
            stats: RwLock::new(CollectorStats::default()),
        }
    }

    /// The metric catalog this collector emits against.
    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        &self.catalog
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }

    /// Run one full collection cycle.
    pub async fn collect(&self) -> CycleReport {
        let _guard = match &self.cycle_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let started = Instant::now();
        let mut report = self.run_cycle().await;
        report.duration = started.elapsed();

        self.record(&report);

        if report.is_up() {
            info!(
                symbols = report.tickers_attempted,
                samples = report.samples.len(),
                failed_symbols = report.symbol_failures.len(),
                rejected_fields = report.field_rejections,
                duration_ms = report.duration.as_millis() as u64,
                "Exchange scraped"
            );
        }

        report
    }

    async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport {
            samples: Vec::new(),
            discovery_error: None,
            symbols_discovered: 0,
            symbols_duplicate: 0,
            symbols_filtered: 0,
            tickers_attempted: 0,
            symbol_failures: Vec::new(),
            field_rejections: 0,
            duration: Duration::ZERO,
        };

        let mut symbols = match self.exchange.fetch_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                error!(error = %e, "Symbol discovery failed");
                report.samples.push(MetricSample::up(false));
                report.discovery_error = Some(e);
                return report;
            }
        };

        report.samples.push(MetricSample::up(true));
        report.symbols_discovered = symbols.len();

        let duplicates = symbols.dedup();
        if !duplicates.is_empty() {
            warn!(?duplicates, "Discovery returned repeated symbols, fetching each once");
        }
        report.symbols_duplicate = duplicates.len();
        report.symbols_filtered = symbols.retain(|s| self.filter.should_include(s));

        debug!(
            discovered = report.symbols_discovered,
            duplicate = report.symbols_duplicate,
            filtered = report.symbols_filtered,
            "Symbols discovered"
        );

        self.fetch_tickers(&symbols, &mut report).await;
        report
    }

    async fn fetch_tickers(&self, symbols: &SymbolSet, report: &mut CycleReport) {
        report.samples.reserve(symbols.len() * PriceField::ALL.len());

        for symbol in symbols {
            report.tickers_attempted += 1;

            let response = match self.exchange.fetch_ticker(symbol).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Ticker fetch failed, skipping symbol");
                    report.symbol_failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        error: e,
                    });
                    continue;
                }
            };

            let (snapshot, rejected) = TickerSnapshot::parse(&response);
            for (field, reason) in &rejected {
                debug!(symbol = %symbol, field = %field, reason = %reason, "Price field omitted");
            }
            report.field_rejections += rejected.len();

            report.samples.extend(
                snapshot
                    .prices()
                    .map(|(field, value)| MetricSample::price(symbol, field, value)),
            );
        }
    }

    fn record(&self, report: &CycleReport) {
        let mut stats = self.stats.write();
        stats.cycles += 1;
        if !report.is_up() {
            stats.cycles_failed += 1;
        }
        stats.ticker_failures += report.symbol_failures.len() as u64;
        stats.field_parse_failures += report.field_rejections as u64;
        stats.last_cycle_duration = report.duration;
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<TickerCollector>;
