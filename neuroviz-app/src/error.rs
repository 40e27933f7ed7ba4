//! Error types for the neuroviz host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Response error: {0}")]
    Response(#[from] neuroviz_data::ResponseError),

    #[error("Capture error: {0}")]
    Capture(#[from] neuroviz_capture::CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Viewer error: {0}")]
    Viewer(String),
}
