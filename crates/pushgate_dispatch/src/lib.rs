//! Dispatch engine for pushgate
//!
//! Delivers one [`NotificationPayload`](pushgate_common::NotificationPayload)
//! to a set of device tokens through a [`NotificationSink`], and reports a
//! per-target outcome for every token in a [`DispatchResult`].
//!
//! - Failures are isolated per target; one bad token never aborts the others.
//! - Transient failures are retried up to `retry_bound` extra times with
//!   exponential backoff. Permanent ones are never retried.
//! - Tokens reported as permanently invalid are deactivated in the registry.
//! - At most `max_in_flight` sink calls run at once. An optional deadline stops
//!   new attempts; targets not yet started are reported as transient failures.
//!
//! # Example
//!
//! ```rust,no_run
//! use pushgate_common::NotificationPayload;
//! use pushgate_config::DispatchConfig;
//! use pushgate_db::InMemoryDeviceRegistrationRepository;
//! use pushgate_dispatch::{DispatchEngine, DispatchTarget, NotificationSink, SendOutcome};
//! use std::sync::Arc;
//!
//! struct LogSink;
//!
//! #[async_trait::async_trait]
//! impl NotificationSink for LogSink {
//!     async fn send(&self, token: &str, _payload: &NotificationPayload) -> SendOutcome {
//!         SendOutcome::Delivered(format!("sent-to-{}", token))
//!     }
//! }
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
//!     let engine = DispatchEngine::new(registry, Arc::new(LogSink), &DispatchConfig::default());
//!     let result = engine
//!         .dispatch(NotificationPayload::new("Hi", "there"), DispatchTarget::AllActive)
//!         .await?;
//!     println!("{} of {} delivered", result.success_count, result.target_count);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod result;
pub mod retry;
pub mod sink;

pub use engine::{DispatchEngine, DispatchTarget, DEADLINE_NOT_ATTEMPTED};
pub use result::{DeliveryOutcome, DispatchResult, TargetFailure};
pub use retry::RetryPolicy;
pub use sink::{NotificationSink, SendOutcome};
