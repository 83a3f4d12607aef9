//! Prometheus exporter for cryptocurrency exchange tickers.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tickersight_exporter_prometheus::{
    ExchangeClient, ExporterConfig, HttpServer, MetricCatalog, TickerCollector,
};

/// Prometheus exporter for cryptocurrency exchange tickers.
#[derive(Parser, Debug)]
#[command(name = "tickersight-exporter-prometheus")]
#[command(about = "Export exchange ticker prices as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Exchange REST API base URL (overrides config).
    #[arg(long)]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI overrides
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(base_url) = args.base_url {
        config.exchange.base_url = base_url;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    tickersight_common::init_tracing(&config.logging)?;

    let exchange = Arc::new(ExchangeClient::from_config(&config.exchange)?);

    info!(
        exchange = %exchange.base_url(),
        timeout_secs = config.exchange.request_timeout_secs,
        single_flight = config.collection.single_flight,
        "Starting TickerSight Prometheus Exporter"
    );

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Fixed for the process lifetime
    let catalog = Arc::new(MetricCatalog::new(config.prometheus.prefix.clone()));
    let collector = Arc::new(TickerCollector::new(
        exchange,
        catalog,
        &config.collection,
        &config.filters,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        collector.clone(),
        listen_addr,
        config.prometheus.path.clone(),
        config.prometheus.default_labels.clone(),
    );
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    if tokio::time::timeout(Duration::from_secs(5), http_task)
        .await
        .is_err()
    {
        warn!("HTTP server did not stop within 5s");
    }

    let stats = collector.stats();
    info!(
        cycles = stats.cycles,
        cycles_failed = stats.cycles_failed,
        ticker_failures = stats.ticker_failures,
        field_parse_failures = stats.field_parse_failures,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

/// Resolve when SIGTERM is received (never on non-unix platforms).
async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
