//! Aggregated outcome of one dispatch

use serde::Serialize;
use std::collections::BTreeSet;

/// Terminal state of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Success,
    /// Retries exhausted, or never attempted before the deadline
    TransientFailure,
    /// The provider rejected the token for good
    PermanentFailure,
    /// The provider refused the request; the token is left alone
    RejectedFailure,
}

/// What went wrong for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TargetFailure {
    pub token: String,
    pub kind: DeliveryOutcome,
    pub reason: String,
    /// Sink calls made for this target; 0 when the deadline hit first
    pub attempts: u32,
}

/// Result of delivering one payload to its targets
///
/// `success_count + failure_count == target_count` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DispatchResult {
    pub target_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Tokens the provider reported as permanently unreachable
    pub invalid_tokens: BTreeSet<String>,
    pub failures: Vec<TargetFailure>,
}

/// Final report for one target, produced by a delivery task
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TargetReport {
    pub token: String,
    pub outcome: DeliveryOutcome,
    pub reason: Option<String>,
    pub attempts: u32,
}

impl TargetReport {
    pub(crate) fn success(token: String, attempts: u32) -> Self {
        Self {
            token,
            outcome: DeliveryOutcome::Success,
            reason: None,
            attempts,
        }
    }

    pub(crate) fn failure(
        token: String,
        outcome: DeliveryOutcome,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            token,
            outcome,
            reason: Some(reason.into()),
            attempts,
        }
    }
}

impl DispatchResult {
    pub(crate) fn with_targets(target_count: usize) -> Self {
        Self {
            target_count,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, report: TargetReport) {
        match report.outcome {
            DeliveryOutcome::Success => self.success_count += 1,
            DeliveryOutcome::TransientFailure
            | DeliveryOutcome::PermanentFailure
            | DeliveryOutcome::RejectedFailure => {
                self.failure_count += 1;
                if report.outcome == DeliveryOutcome::PermanentFailure {
                    self.invalid_tokens.insert(report.token.clone());
                }
                self.failures.push(TargetFailure {
                    token: report.token,
                    kind: report.outcome,
                    reason: report.reason.unwrap_or_default(),
                    attempts: report.attempts,
                });
            }
        }
    }

    /// True when every target was delivered (vacuously true with no targets)
    pub fn is_complete(&self) -> bool {
        self.success_count == self.target_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tallies_each_outcome_once() {
        let mut result = DispatchResult::with_targets(4);
        result.record(TargetReport::success("a".into(), 1));
        result.record(TargetReport::failure(
            "b".into(),
            DeliveryOutcome::PermanentFailure,
            "UNREGISTERED",
            1,
        ));
        result.record(TargetReport::failure(
            "c".into(),
            DeliveryOutcome::TransientFailure,
            "timeout",
            2,
        ));
        result.record(TargetReport::failure(
            "d".into(),
            DeliveryOutcome::RejectedFailure,
            "Invalid data payload key: from",
            1,
        ));

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 3);
        assert_eq!(result.invalid_tokens.len(), 1);
        assert!(result.invalid_tokens.contains("b"));
        assert!(!result.invalid_tokens.contains("d"));
        assert_eq!(result.failures.len(), 3);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_serializes_outcome_in_snake_case() {
        let mut result = DispatchResult::with_targets(1);
        result.record(TargetReport::failure(
            "tok".into(),
            DeliveryOutcome::TransientFailure,
            "quota",
            2,
        ));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failures"][0]["kind"], "transient_failure");
        assert_eq!(json["target_count"], 1);
    }
}
