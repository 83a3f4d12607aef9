//! HTTP server for Prometheus metrics endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::collector::SharedCollector;
use crate::mapping::{CONTENT_TYPE, ScrapeSnapshot, render};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
    default_labels: Arc<HashMap<String, String>>,
}

/// Create the HTTP router.
fn create_router(
    collector: SharedCollector,
    metrics_path: &str,
    default_labels: HashMap<String, String>,
) -> Router {
    let state = AppState {
        collector,
        default_labels: Arc::new(default_labels),
    };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint: one scrape, one collection cycle.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let report = state.collector.collect().await;
    let snapshot = ScrapeSnapshot::new(
        state.collector.catalog().clone(),
        report,
        state.collector.stats(),
    );

    match render(snapshot, &state.default_labels) {
        Ok(body) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to encode metrics\n",
            )
                .into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    let stats = state.collector.stats();

    // Ready once the exchange has answered symbol discovery at least once.
    if stats.cycles > stats.cycles_failed {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no successful symbol discovery yet\n",
        )
            .into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
    default_labels: HashMap<String, String>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        collector: SharedCollector,
        listen_addr: SocketAddr,
        metrics_path: String,
        default_labels: HashMap<String, String>,
    ) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
            default_labels,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(self.collector, &self.metrics_path, self.default_labels);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
