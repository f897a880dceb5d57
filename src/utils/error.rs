//! Error types and handling
//!
//! Common error types used across the recorder.

use crate::capture::CaptureError;
use crate::export::ExportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Camera or microphone input/output could not be attached
    #[error("Session configuration error: {0}")]
    SessionConfiguration(String),

    /// The finished segment file is missing, unreadable or empty
    #[error("Recording finalize error: {0}")]
    RecordingFinalize(String),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CaptureError> for AppError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::Finalize(msg) => AppError::RecordingFinalize(msg),
            CaptureError::Io(e) => AppError::Io(e),
            other => AppError::SessionConfiguration(other.to_string()),
        }
    }
}

/// Error response for the presentation layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::SessionConfiguration(_) => "SESSION_CONFIGURATION_ERROR",
            AppError::RecordingFinalize(_) => "RECORDING_FINALIZE_ERROR",
            AppError::Export(ExportError::Cancelled) => "EXPORT_CANCELLED",
            AppError::Export(_) => "EXPORT_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
