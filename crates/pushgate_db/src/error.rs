//! Error types for the token registry

use pushgate_common::{config_error, not_found, validation_error, PushgateError};
use thiserror::Error;

/// Errors that can occur when working with the token registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Empty device_id or token; nothing was written
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No registration exists for the requested device
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Error from SQLx
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query or row decoding
    #[error("Database query error: {0}")]
    QueryError(String),
}

impl From<RegistryError> for PushgateError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidInput(msg) => validation_error(msg),
            RegistryError::NotFound(device_id) => not_found(format!("device {}", device_id)),
            RegistryError::ConfigError(msg) => config_error(msg),
            other => PushgateError::DatabaseError(other.to_string()),
        }
    }
}
