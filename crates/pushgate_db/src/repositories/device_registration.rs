//! Repository for device registrations
//!
//! This module defines the storage-agnostic interface of the token registry.
//! The dispatch engine and the HTTP layer only ever see this trait.

use crate::error::RegistryError;
use async_trait::async_trait;

// Re-export DeviceRegistration from pushgate_common for convenience
pub use pushgate_common::models::DeviceRegistration;

/// Repository for device registrations
///
/// Implementations must keep at most one record per `device_id` and must apply
/// `register` atomically: readers never observe a half-written upsert.
#[async_trait]
pub trait DeviceRegistrationRepository: Send + Sync {
    /// Initialize the backing storage
    ///
    /// Creates tables and indexes if they don't already exist.
    async fn init_schema(&self) -> Result<(), RegistryError>;

    /// Register a device, or refresh the token of an existing one
    ///
    /// A new `device_id` gets `registered_at = updated_at = now`. An existing one
    /// gets the new token, `active = true` and a bumped `updated_at`.
    ///
    /// # Errors
    ///
    /// `RegistryError::InvalidInput` if `device_id` or `token` is empty.
    async fn register(
        &self,
        device_id: &str,
        token: &str,
    ) -> Result<DeviceRegistration, RegistryError>;

    /// Tokens of all active registrations, in registration order
    async fn get_active_tokens(&self) -> Result<Vec<String>, RegistryError>;

    /// Find the registration for a device
    ///
    /// # Errors
    ///
    /// `RegistryError::NotFound` if the device never registered.
    async fn get_by_device(&self, device_id: &str) -> Result<DeviceRegistration, RegistryError>;

    /// All registrations, active or not, in registration order
    async fn list_registrations(&self) -> Result<Vec<DeviceRegistration>, RegistryError>;

    /// Mark every active registration holding `token` as inactive
    ///
    /// Returns how many records changed. An unknown token is not an error.
    async fn deactivate(&self, token: &str) -> Result<u64, RegistryError>;

    /// Whether the backing storage is reachable
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Rejects empty or whitespace-only identifiers before any write
pub fn validate_registration(device_id: &str, token: &str) -> Result<(), RegistryError> {
    if device_id.trim().is_empty() {
        return Err(RegistryError::InvalidInput(
            "device_id must not be empty".to_string(),
        ));
    }
    if token.trim().is_empty() {
        return Err(RegistryError::InvalidInput(
            "token must not be empty".to_string(),
        ));
    }
    Ok(())
}
