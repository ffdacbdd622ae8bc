//! Fan-out of one payload to many tokens
//!
//! Targets are resolved once from the registry, then delivered concurrently
//! with at most `max_in_flight` sink calls outstanding. Every target ends in
//! exactly one outcome. Tokens the sink reports as permanently invalid are
//! deactivated after the fan-out completes.

use crate::result::{DeliveryOutcome, DispatchResult, TargetReport};
use crate::retry::RetryPolicy;
use crate::sink::{NotificationSink, SendOutcome};
use pushgate_common::{token_prefix, NotificationPayload};
use pushgate_config::DispatchConfig;
use pushgate_db::{DeviceRegistrationRepository, RegistryError};
use std::collections::HashSet;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Reason recorded for targets that never got a permit before the deadline
pub const DEADLINE_NOT_ATTEMPTED: &str = "deadline reached before delivery was attempted";

/// Who a dispatch is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Every active token in the registry, in registration order
    AllActive,
    /// A single token, sent as-is even if the registry does not know it
    Token(String),
}

impl FromStr for DispatchTarget {
    type Err = Infallible;

    /// `"all"` (any case) or a blank string selects every active token.
    /// Any other input is kept verbatim as the token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Ok(DispatchTarget::AllActive)
        } else {
            Ok(DispatchTarget::Token(s.to_string()))
        }
    }
}

impl From<Option<String>> for DispatchTarget {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(raw) => raw.parse().unwrap_or(DispatchTarget::AllActive),
            None => DispatchTarget::AllActive,
        }
    }
}

/// Delivers payloads through a sink on behalf of the registry's devices
pub struct DispatchEngine {
    registry: Arc<dyn DeviceRegistrationRepository>,
    sink: Arc<dyn NotificationSink>,
    retry_policy: RetryPolicy,
    max_in_flight: usize,
    default_deadline: Option<Duration>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<dyn DeviceRegistrationRepository>,
        sink: Arc<dyn NotificationSink>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            retry_policy: RetryPolicy::from_config(config),
            max_in_flight: config.max_in_flight.max(1),
            default_deadline: config.deadline_ms.map(Duration::from_millis),
        }
    }

    pub fn registry(&self) -> &Arc<dyn DeviceRegistrationRepository> {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Dispatch using the configured default deadline, if any
    pub async fn dispatch(
        &self,
        payload: NotificationPayload,
        target: DispatchTarget,
    ) -> Result<DispatchResult, RegistryError> {
        let deadline = self.default_deadline.map(|d| Instant::now() + d);
        self.dispatch_with_deadline(payload, target, deadline).await
    }

    /// Dispatch with an explicit deadline
    ///
    /// Only a failure to read the target set is returned as an error; every
    /// delivery problem is reported inside the [`DispatchResult`].
    pub async fn dispatch_with_deadline(
        &self,
        payload: NotificationPayload,
        target: DispatchTarget,
        deadline: Option<Instant>,
    ) -> Result<DispatchResult, RegistryError> {
        let tokens = self.resolve_targets(target).await?;
        let mut result = DispatchResult::with_targets(tokens.len());

        if tokens.is_empty() {
            info!("No active targets, nothing to dispatch");
            return Ok(result);
        }

        info!(
            "Dispatching '{}' to {} target(s) (max_in_flight={}, retry_bound={})",
            payload.title,
            tokens.len(),
            self.max_in_flight,
            self.retry_policy.retry_bound
        );

        let payload = Arc::new(payload);
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut outstanding: HashSet<String> = HashSet::with_capacity(tokens.len());
        let mut pending = tokens.into_iter();

        while let Some(token) = pending.next() {
            let Some(permit) = acquire_permit(&semaphore, deadline).await else {
                warn!("Dispatch deadline reached with targets still queued");
                result.record(not_attempted(token));
                for token in pending.by_ref() {
                    result.record(not_attempted(token));
                }
                break;
            };

            outstanding.insert(token.clone());
            let sink = Arc::clone(&self.sink);
            let payload = Arc::clone(&payload);
            let policy = self.retry_policy.clone();

            tasks.spawn(async move {
                let _permit: OwnedSemaphorePermit = permit;
                deliver(sink.as_ref(), token, &payload, &policy, deadline).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    outstanding.remove(&report.token);
                    result.record(report);
                }
                Err(e) => error!("Delivery task failed: {}", e),
            }
        }

        // Targets whose task died without reporting
        for token in outstanding {
            result.record(TargetReport::failure(
                token,
                DeliveryOutcome::TransientFailure,
                "delivery task failed",
                0,
            ));
        }

        self.deactivate_invalid(&result).await;

        info!(
            "Dispatch finished: {} target(s), {} succeeded, {} failed, {} invalid",
            result.target_count,
            result.success_count,
            result.failure_count,
            result.invalid_tokens.len()
        );
        Ok(result)
    }

    /// Snapshot the target tokens; duplicates are sent once
    async fn resolve_targets(&self, target: DispatchTarget) -> Result<Vec<String>, RegistryError> {
        let tokens = match target {
            DispatchTarget::AllActive => self.registry.get_active_tokens().await.map_err(|e| {
                error!("Failed to resolve dispatch targets: {}", e);
                e
            })?,
            DispatchTarget::Token(token) => vec![token],
        };

        let mut seen = HashSet::with_capacity(tokens.len());
        Ok(tokens
            .into_iter()
            .filter(|token| seen.insert(token.clone()))
            .collect())
    }

    async fn deactivate_invalid(&self, result: &DispatchResult) {
        for token in &result.invalid_tokens {
            match self.registry.deactivate(token).await {
                Ok(0) => debug!(
                    "Invalid token {} had no active registration",
                    token_prefix(token)
                ),
                Ok(_) => {}
                Err(e) => warn!(
                    "Failed to deactivate invalid token {}: {}",
                    token_prefix(token),
                    e
                ),
            }
        }
    }
}

fn not_attempted(token: String) -> TargetReport {
    TargetReport::failure(
        token,
        DeliveryOutcome::TransientFailure,
        DEADLINE_NOT_ATTEMPTED,
        0,
    )
}

async fn acquire_permit(
    semaphore: &Arc<Semaphore>,
    deadline: Option<Instant>,
) -> Option<OwnedSemaphorePermit> {
    let acquire = Arc::clone(semaphore).acquire_owned();
    match deadline {
        Some(deadline) => {
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::timeout_at(deadline, acquire).await.ok()?.ok()
        }
        None => acquire.await.ok(),
    }
}

/// Send to one token, retrying transient failures within the policy
async fn deliver(
    sink: &dyn NotificationSink,
    token: String,
    payload: &NotificationPayload,
    policy: &RetryPolicy,
    deadline: Option<Instant>,
) -> TargetReport {
    let mut attempts = 0;

    loop {
        attempts += 1;
        match sink.send(&token, payload).await {
            SendOutcome::Delivered(message_id) => {
                debug!(
                    "Delivered to {} (message {}, attempt {})",
                    token_prefix(&token),
                    message_id,
                    attempts
                );
                return TargetReport::success(token, attempts);
            }
            SendOutcome::PermanentInvalidToken(reason) => {
                warn!("Token {} rejected: {}", token_prefix(&token), reason);
                return TargetReport::failure(
                    token,
                    DeliveryOutcome::PermanentFailure,
                    reason,
                    attempts,
                );
            }
            SendOutcome::Rejected(reason) => {
                warn!(
                    "Request for {} refused by provider: {}",
                    token_prefix(&token),
                    reason
                );
                return TargetReport::failure(
                    token,
                    DeliveryOutcome::RejectedFailure,
                    reason,
                    attempts,
                );
            }
            SendOutcome::TransientError(reason) => {
                if attempts >= policy.max_attempts() {
                    warn!(
                        "Giving up on {} after {} attempt(s): {}",
                        token_prefix(&token),
                        attempts,
                        reason
                    );
                    return TargetReport::failure(
                        token,
                        DeliveryOutcome::TransientFailure,
                        reason,
                        attempts,
                    );
                }

                let delay = policy.calculate_delay(attempts - 1);
                if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
                    return TargetReport::failure(
                        token,
                        DeliveryOutcome::TransientFailure,
                        format!("{} (deadline reached before retry)", reason),
                        attempts,
                    );
                }

                debug!(
                    "Retrying {} in {:?} after transient error: {}",
                    token_prefix(&token),
                    delay,
                    reason
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
