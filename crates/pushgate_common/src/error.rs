// --- File: crates/pushgate_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type surfaced to callers of pushgate.
///
/// Each crate extends this by implementing `From<SpecificError> for PushgateError`.
#[derive(Error, Debug)]
pub enum PushgateError {
    /// Malformed caller input, rejected before any side effect
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Lookup of something that does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during a storage operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for PushgateError {
    fn status_code(&self) -> u16 {
        match self {
            PushgateError::ValidationError(_) => 400,
            PushgateError::NotFoundError(_) => 404,
            PushgateError::ConfigError(_) => 500,
            PushgateError::DatabaseError(_) => 500,
            PushgateError::InternalError(_) => 500,
        }
    }
}

impl From<std::io::Error> for PushgateError {
    fn from(err: std::io::Error) -> Self {
        internal_error(err)
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> PushgateError {
    PushgateError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> PushgateError {
    PushgateError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> PushgateError {
    PushgateError::NotFoundError(message.to_string())
}

pub fn internal_error<T: fmt::Display>(message: T) -> PushgateError {
    PushgateError::InternalError(message.to_string())
}
