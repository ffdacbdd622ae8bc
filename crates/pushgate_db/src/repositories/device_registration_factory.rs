//! Factory for creating device registration repositories
//!
//! One factory builds every backend, keyed by what the backend is built from:
//! a `DbClient` for SQL storage, `()` for the in-memory registry.

use crate::repositories::device_registration_memory::InMemoryDeviceRegistrationRepository;
use crate::repositories::device_registration_sql::SqlDeviceRegistrationRepository;
use crate::{DbClient, RepositoryFactory};

/// Factory for creating device registration repositories
#[derive(Debug, Clone)]
pub struct DeviceRegistrationRepositoryFactory;

impl DeviceRegistrationRepositoryFactory {
    /// Create a new device registration repository factory
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeviceRegistrationRepositoryFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryFactory<SqlDeviceRegistrationRepository, DbClient>
    for DeviceRegistrationRepositoryFactory
{
    fn create_repository(&self, db_client: DbClient) -> SqlDeviceRegistrationRepository {
        SqlDeviceRegistrationRepository::new(db_client)
    }
}

impl RepositoryFactory<InMemoryDeviceRegistrationRepository, ()>
    for DeviceRegistrationRepositoryFactory
{
    fn create_repository(&self, _: ()) -> InMemoryDeviceRegistrationRepository {
        InMemoryDeviceRegistrationRepository::new()
    }
}
