//! Token registry for pushgate
//!
//! This crate maps logical device identifiers to their current delivery token.
//! The registry sits behind the [`DeviceRegistrationRepository`] trait so the
//! storage backend can be swapped without touching its callers.
//!
//! # Backends
//!
//! - [`InMemoryDeviceRegistrationRepository`]: process-local, lost on restart
//! - [`SqlDeviceRegistrationRepository`]: SQLx `Any` driver, SQLite by default,
//!   PostgreSQL with the `postgres` feature
//!
//! # Example
//!
//! ```rust,no_run
//! use pushgate_db::{
//!     DbClient, DeviceRegistrationRepository, DeviceRegistrationRepositoryFactory,
//!     RepositoryFactory, SqlDeviceRegistrationRepository,
//! };
//!
//! async fn setup_registry() -> Result<(), Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_url("sqlite:data/pushgate.db").await?;
//!     let registry: SqlDeviceRegistrationRepository =
//!         DeviceRegistrationRepositoryFactory::new().create_repository(db_client);
//!     registry.init_schema().await?;
//!     registry.register("phoneA", "tok-111").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
pub mod repository;

// Re-export the client, error and factory trait for ease of use
pub use client::{DbClient, DbDialect};
pub use error::RegistryError;
pub use repository::RepositoryFactory;

// Re-export the repositories module components for ease of use
pub use repositories::{
    validate_registration, DeviceRegistration, DeviceRegistrationRepository,
    DeviceRegistrationRepositoryFactory, InMemoryDeviceRegistrationRepository,
    SqlDeviceRegistrationRepository,
};
