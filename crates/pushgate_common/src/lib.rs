// --- File: crates/pushgate_common/src/lib.rs ---

// Declare modules within this crate
pub mod models; // Data structures and models
pub mod error; // Error handling
pub mod logging; // Logging utilities

// Re-export error types and utilities for easier access
pub use error::{
    config_error, internal_error, not_found, validation_error,
    HttpStatusCode, PushgateError,
};

// Re-export the shared models
pub use models::{DeviceRegistration, NotificationPayload};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, token_prefix};
