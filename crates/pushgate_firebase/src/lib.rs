//! Firebase Cloud Messaging integration for pushgate
//!
//! Provides the FCM HTTP v1 [`NotificationSink`](pushgate_dispatch::NotificationSink)
//! and the axum routes for device registration and dispatch.
//!
//! # Features
//!
//! - Service account authentication with a cached OAuth2 token
//! - Per-token delivery with FCM error classification (dead tokens vs. retryable)
//! - Device registration and listing endpoints backed by the token registry
//! - OpenAPI/Swagger documentation (with the `openapi` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use pushgate_config::AppConfig;
//! use pushgate_db::InMemoryDeviceRegistrationRepository;
//! use pushgate_firebase::{routes, FirebaseState};
//! use std::sync::Arc;
//!
//! fn setup_app() -> axum::Router {
//!     let config = AppConfig::default();
//!     let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
//!     let state = FirebaseState::from_config(&config, registry);
//!     routes(Arc::new(state))
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - Service status
//! - `POST /register-device` - Register or refresh a device token
//! - `GET /devices` - List registrations
//! - `GET /devices/{device_id}` - Show one registration
//! - `POST /send-notification` - Send to all active devices or one token

pub mod auth;
pub mod client;
#[cfg(feature = "openapi")]
pub mod doc;
pub mod handlers;
pub mod routes;

pub use client::{FirebaseClient, FirebaseError};
pub use handlers::FirebaseState;
// Re-export the routes function to be used by the main backend service
pub use routes::routes;

#[cfg(feature = "openapi")]
pub mod openapi {
    pub use crate::doc::FirebaseApiDoc;
}
