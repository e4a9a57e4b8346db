//! Error types and handling
//!
//! Common error types used across the crate.

use crate::capture::AcquisitionError;
use crate::encoder::EncodingError;
use crate::output::StorageError;
use crate::recorder::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Recording error: {0}")]
    Session(SessionError),
}

impl From<SessionError> for AppError {
    /// Lift wrapped lower-level errors so they keep their own codes
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Acquisition(e) => AppError::Acquisition(e),
            SessionError::Encoding(e) => AppError::Encoding(e),
            SessionError::Storage(e) => AppError::Storage(e),
            other => AppError::Session(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Config(format!("{:#}", error))
    }
}

/// Error response for the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Acquisition(AcquisitionError::PermissionDenied(_)) => "PERMISSION_DENIED",
            AppError::Acquisition(_) => "CAPTURE_ERROR",
            AppError::Encoding(_) => "ENCODING_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Session(_) => "RECORDING_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Flatten any crate error into the string the command layer returns
pub fn command_error(error: impl Into<AppError>) -> String {
    ErrorResponse::from(error.into()).to_string()
}
