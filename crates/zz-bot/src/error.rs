//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] zz_ws::WsError),

    #[error("Feed error: {0}")]
    Feed(#[from] zz_feed::FeedError),

    #[error("Engine error: {0}")]
    Engine(#[from] zz_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] zz_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zz_core::CoreError> for AppError {
    fn from(e: zz_core::CoreError) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
