use thiserror::Error;

/// Common error type for TickerSight components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using TickerSight's Error.
pub type Result<T> = std::result::Result<T, Error>;
