//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<vwap_ws::WsError>),

    #[error("Feed error: {0}")]
    Feed(#[from] vwap_feed::FeedError),

    #[error("Core error: {0}")]
    Core(#[from] vwap_core::CoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] vwap_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
