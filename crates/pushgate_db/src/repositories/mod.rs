//! Repository modules for the token registry
//!
//! The capability trait lives in `device_registration`; each storage backend has
//! its own module.

pub mod device_registration;
pub mod device_registration_factory;
pub mod device_registration_memory;
pub mod device_registration_sql;

// Re-export the device registration repository and factory for ease of use
pub use device_registration::{validate_registration, DeviceRegistration, DeviceRegistrationRepository};
pub use device_registration_factory::DeviceRegistrationRepositoryFactory;
pub use device_registration_memory::InMemoryDeviceRegistrationRepository;
pub use device_registration_sql::SqlDeviceRegistrationRepository;
