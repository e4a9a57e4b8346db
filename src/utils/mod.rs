//! Shared utilities

pub mod error;

pub use error::{command_error, AppError, AppResult, ErrorResponse};
