//! The outbound boundary of the dispatch engine
//!
//! A sink delivers one payload to one token and reports how it went. The sink
//! is the only authority on whether a token is dead; the engine never inspects
//! token contents.

use async_trait::async_trait;
use pushgate_common::NotificationPayload;

/// Result of a single delivery attempt as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the provider; carries the provider's message id
    Delivered(String),

    /// Timeout, rate limit, provider outage and the like. Worth retrying.
    TransientError(String),

    /// The token is unregistered or otherwise dead. Never retried.
    PermanentInvalidToken(String),

    /// The provider refused the request itself (bad payload, malformed
    /// message). Never retried, and says nothing about the token.
    Rejected(String),
}

/// A push provider the engine can deliver through
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `payload` to `token` once
    async fn send(&self, token: &str, payload: &NotificationPayload) -> SendOutcome;
}
