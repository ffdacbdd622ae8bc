//! Application assembly for the pushgate backend
//!
//! [`build_app`] wires the registry, the Firebase sink and the dispatch engine
//! from an [`AppConfig`](pushgate_config::AppConfig) and returns the router the
//! binary serves.

pub mod service_factory;

pub use service_factory::{build_app, PushgateServiceFactory};
