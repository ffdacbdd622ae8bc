//! In-memory implementation of the device registration repository
//!
//! Nothing survives a restart. Useful for development and as the default when
//! no database is configured.

use crate::error::RegistryError;
use crate::repositories::device_registration::{
    validate_registration, DeviceRegistration, DeviceRegistrationRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use pushgate_common::token_prefix;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Registry {
    /// Records in registration order
    records: Vec<DeviceRegistration>,
    /// Position of each device's record in `records`
    by_device: HashMap<String, usize>,
}

/// In-memory implementation of the device registration repository
#[derive(Debug, Default)]
pub struct InMemoryDeviceRegistrationRepository {
    inner: RwLock<Registry>,
}

impl InMemoryDeviceRegistrationRepository {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistrationRepository for InMemoryDeviceRegistrationRepository {
    async fn init_schema(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn register(
        &self,
        device_id: &str,
        token: &str,
    ) -> Result<DeviceRegistration, RegistryError> {
        validate_registration(device_id, token)?;

        let mut registry = self.inner.write().await;

        if let Some(&index) = registry.by_device.get(device_id) {
            debug!("Updating existing registration for device: {}", device_id);
            let record = &mut registry.records[index];
            record.token = token.to_string();
            record.active = true;
            record.updated_at = Utc::now();
            return Ok(record.clone());
        }

        let mut registration = DeviceRegistration::new(device_id.to_string(), token.to_string());
        registration.id = Some(registry.records.len() as i64 + 1);
        let index = registry.records.len();
        registry.records.push(registration.clone());
        registry.by_device.insert(device_id.to_string(), index);

        info!(
            "Registered device {} with token {}",
            device_id,
            token_prefix(token)
        );
        Ok(registration)
    }

    async fn get_active_tokens(&self) -> Result<Vec<String>, RegistryError> {
        let registry = self.inner.read().await;
        Ok(registry
            .records
            .iter()
            .filter(|record| record.active)
            .map(|record| record.token.clone())
            .collect())
    }

    async fn get_by_device(&self, device_id: &str) -> Result<DeviceRegistration, RegistryError> {
        let registry = self.inner.read().await;
        registry
            .by_device
            .get(device_id)
            .map(|&index| registry.records[index].clone())
            .ok_or_else(|| RegistryError::NotFound(device_id.to_string()))
    }

    async fn list_registrations(&self) -> Result<Vec<DeviceRegistration>, RegistryError> {
        Ok(self.inner.read().await.records.clone())
    }

    async fn deactivate(&self, token: &str) -> Result<u64, RegistryError> {
        let mut registry = self.inner.write().await;
        let mut changed = 0;
        for record in registry
            .records
            .iter_mut()
            .filter(|record| record.active && record.token == token)
        {
            record.active = false;
            changed += 1;
        }

        if changed > 0 {
            info!(
                "Deactivated {} registration(s) for token {}",
                changed,
                token_prefix(token)
            );
        }
        Ok(changed)
    }
}
