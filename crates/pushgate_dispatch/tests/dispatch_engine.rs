use async_trait::async_trait;
use pushgate_common::NotificationPayload;
use pushgate_config::DispatchConfig;
use pushgate_db::{
    DeviceRegistration, DeviceRegistrationRepository, InMemoryDeviceRegistrationRepository,
    RegistryError,
};
use pushgate_dispatch::{
    DeliveryOutcome, DispatchEngine, DispatchTarget, NotificationSink, SendOutcome,
    DEADLINE_NOT_ATTEMPTED,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Sink that replays scripted outcomes per token and delivers otherwise
#[derive(Default)]
struct ScriptedSink {
    scripts: Mutex<HashMap<String, VecDeque<SendOutcome>>>,
    calls: Mutex<HashMap<String, u32>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedSink {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn script(self, token: &str, outcomes: Vec<SendOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(token.to_string(), outcomes.into());
        self
    }

    fn calls_for(&self, token: &str) -> u32 {
        self.calls.lock().unwrap().get(token).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl NotificationSink for ScriptedSink {
    async fn send(&self, token: &str, _payload: &NotificationPayload) -> SendOutcome {
        *self.calls.lock().unwrap().entry(token.to_string()).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(token)
            .and_then(|outcomes| outcomes.pop_front());
        scripted.unwrap_or_else(|| SendOutcome::Delivered(format!("projects/p/messages/{}", token)))
    }
}

fn config(max_in_flight: usize, retry_bound: u32) -> DispatchConfig {
    DispatchConfig {
        max_in_flight,
        retry_bound,
        ..DispatchConfig::default()
    }
}

async fn registry_with(devices: &[(&str, &str)]) -> Arc<InMemoryDeviceRegistrationRepository> {
    let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
    for (device_id, token) in devices {
        registry.register(device_id, token).await.unwrap();
    }
    registry
}

fn payload() -> NotificationPayload {
    NotificationPayload::new("Hi", "there")
}

#[tokio::test]
async fn test_partial_failure_is_isolated_and_invalid_token_deactivated() {
    let registry = registry_with(&[("d1", "tok-1"), ("d2", "tok-2"), ("d3", "tok-3")]).await;
    let sink = Arc::new(ScriptedSink::default().script(
        "tok-2",
        vec![SendOutcome::PermanentInvalidToken("UNREGISTERED".into())],
    ));
    let engine = DispatchEngine::new(registry.clone(), sink.clone(), &config(4, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.target_count, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.invalid_tokens.len(), 1);
    assert!(result.invalid_tokens.contains("tok-2"));
    assert_eq!(result.failures[0].kind, DeliveryOutcome::PermanentFailure);
    assert_eq!(result.failures[0].attempts, 1);
    assert_eq!(sink.calls_for("tok-2"), 1, "permanent failures are not retried");

    assert_eq!(
        registry.get_active_tokens().await.unwrap(),
        vec!["tok-1".to_string(), "tok-3".to_string()]
    );
    assert!(!registry.get_by_device("d2").await.unwrap().active);
}

#[tokio::test]
async fn test_rejected_request_is_not_retried_and_keeps_token_active() {
    let registry = registry_with(&[("d1", "tok-1"), ("d2", "tok-2")]).await;
    let sink = Arc::new(
        ScriptedSink::default()
            .script("tok-1", vec![SendOutcome::Rejected("Invalid data payload key: from".into())])
            .script("tok-2", vec![SendOutcome::Rejected("Invalid data payload key: from".into())]),
    );
    let engine = DispatchEngine::new(registry.clone(), sink.clone(), &config(4, 3));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.target_count, 2);
    assert_eq!(result.failure_count, 2);
    assert!(result.invalid_tokens.is_empty());
    assert!(result
        .failures
        .iter()
        .all(|failure| failure.kind == DeliveryOutcome::RejectedFailure));
    assert_eq!(sink.total_calls(), 2);
    assert_eq!(
        registry.get_active_tokens().await.unwrap(),
        vec!["tok-1".to_string(), "tok-2".to_string()]
    );
}

#[tokio::test]
async fn test_invalid_token_is_excluded_from_later_dispatches() {
    let registry = registry_with(&[("d1", "tok-1"), ("d2", "tok-2")]).await;
    let sink = Arc::new(ScriptedSink::default().script(
        "tok-2",
        vec![SendOutcome::PermanentInvalidToken("UNREGISTERED".into())],
    ));
    let engine = DispatchEngine::new(registry, sink.clone(), &config(4, 1));

    engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();
    let second = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(second.target_count, 1);
    assert_eq!(second.success_count, 1);
    assert_eq!(sink.calls_for("tok-2"), 1);
}

#[tokio::test]
async fn test_empty_registry_yields_empty_result() {
    let registry = registry_with(&[]).await;
    let sink = Arc::new(ScriptedSink::default());
    let engine = DispatchEngine::new(registry, sink.clone(), &config(4, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.target_count, 0);
    assert_eq!(result.success_count, 0);
    assert_eq!(result.failure_count, 0);
    assert!(result.invalid_tokens.is_empty());
    assert!(result.is_complete());
    assert_eq!(sink.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_up_to_the_bound() {
    let registry = registry_with(&[("d1", "tok-1")]).await;
    let always_failing = (0..10)
        .map(|_| SendOutcome::TransientError("HTTP 503".into()))
        .collect();
    let sink = Arc::new(ScriptedSink::default().script("tok-1", always_failing));
    let engine = DispatchEngine::new(registry.clone(), sink.clone(), &config(4, 2));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(sink.calls_for("tok-1"), 3);
    assert_eq!(result.success_count, 0);
    assert_eq!(result.failure_count, 1);
    assert!(result.invalid_tokens.is_empty());
    assert_eq!(result.failures[0].kind, DeliveryOutcome::TransientFailure);
    assert_eq!(result.failures[0].attempts, 3);
    assert_eq!(result.failures[0].reason, "HTTP 503");

    // Transient failures never touch the registry
    assert_eq!(registry.get_active_tokens().await.unwrap(), vec!["tok-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_then_success_counts_as_success() {
    let registry = registry_with(&[("d1", "tok-1")]).await;
    let sink = Arc::new(
        ScriptedSink::default().script("tok-1", vec![SendOutcome::TransientError("timeout".into())]),
    );
    let engine = DispatchEngine::new(registry, sink.clone(), &config(4, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
    assert_eq!(sink.calls_for("tok-1"), 2);
}

#[tokio::test]
async fn test_zero_retry_bound_makes_a_single_attempt() {
    let registry = registry_with(&[("d1", "tok-1")]).await;
    let sink = Arc::new(
        ScriptedSink::default().script("tok-1", vec![SendOutcome::TransientError("quota".into())]),
    );
    let engine = DispatchEngine::new(registry, sink.clone(), &config(4, 0));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.failure_count, 1);
    assert_eq!(sink.calls_for("tok-1"), 1);
}

#[tokio::test]
async fn test_registered_device_receives_notification() {
    let registry = registry_with(&[]).await;
    registry.register("phoneA", "tok-111").await.unwrap();
    let sink = Arc::new(ScriptedSink::default());
    let engine = DispatchEngine::new(registry, sink.clone(), &DispatchConfig::default());

    let result = engine
        .dispatch(
            NotificationPayload::new("Hi", "there").with_data("kind", "greeting"),
            DispatchTarget::AllActive,
        )
        .await
        .unwrap();

    assert_eq!(result.target_count, 1);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
    assert_eq!(sink.calls_for("tok-111"), 1);
}

#[tokio::test]
async fn test_single_token_target_bypasses_registry() {
    let registry = registry_with(&[("d1", "tok-1"), ("d2", "tok-2")]).await;
    let sink = Arc::new(ScriptedSink::default().script(
        "tok-stranger",
        vec![SendOutcome::PermanentInvalidToken("UNREGISTERED".into())],
    ));
    let engine = DispatchEngine::new(registry.clone(), sink.clone(), &config(4, 1));

    let result = engine
        .dispatch(payload(), DispatchTarget::Token("tok-stranger".into()))
        .await
        .unwrap();

    assert_eq!(result.target_count, 1);
    assert_eq!(result.failure_count, 1);
    assert!(result.invalid_tokens.contains("tok-stranger"));
    assert_eq!(sink.calls_for("tok-1"), 0);
    assert_eq!(sink.calls_for("tok-2"), 0);
    // Deactivating an unknown token is a no-op
    assert_eq!(registry.get_active_tokens().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_shared_token_is_sent_once() {
    let registry = registry_with(&[("tablet", "tok-shared"), ("phone", "tok-shared")]).await;
    let sink = Arc::new(ScriptedSink::default());
    let engine = DispatchEngine::new(registry, sink.clone(), &config(4, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.target_count, 1);
    assert_eq!(result.success_count, 1);
    assert_eq!(sink.calls_for("tok-shared"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_sends_never_exceed_bound() {
    let devices: Vec<(String, String)> = (0..12)
        .map(|i| (format!("d{}", i), format!("tok-{}", i)))
        .collect();
    let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
    for (device_id, token) in &devices {
        registry.register(device_id, token).await.unwrap();
    }
    let sink = Arc::new(ScriptedSink::with_latency(Duration::from_millis(20)));
    let engine = DispatchEngine::new(registry, sink.clone(), &config(3, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.target_count, 12);
    assert_eq!(result.success_count, 12);
    assert_eq!(result.success_count + result.failure_count, result.target_count);
    let peak = sink.peak_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {}", peak);
    assert!(peak >= 2, "sends should overlap, peak was {}", peak);
}

#[tokio::test(start_paused = true)]
async fn test_counts_stay_exact_with_mixed_outcomes_under_concurrency() {
    let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
    let mut sink = ScriptedSink::with_latency(Duration::from_millis(5));
    for i in 0..30 {
        let token = format!("tok-{}", i);
        registry.register(&format!("d{}", i), &token).await.unwrap();
        sink = match i % 3 {
            0 => sink.script(&token, vec![SendOutcome::PermanentInvalidToken("UNREGISTERED".into())]),
            1 => sink.script(
                &token,
                vec![
                    SendOutcome::TransientError("503".into()),
                    SendOutcome::TransientError("503".into()),
                ],
            ),
            _ => sink,
        };
    }
    let sink = Arc::new(sink);
    let engine = DispatchEngine::new(registry.clone(), sink.clone(), &config(5, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.target_count, 30);
    assert_eq!(result.success_count, 10);
    assert_eq!(result.failure_count, 20);
    assert_eq!(result.invalid_tokens.len(), 10);
    assert_eq!(result.failures.len(), 20);
    assert_eq!(registry.get_active_tokens().await.unwrap().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_new_attempts_and_lets_in_flight_finish() {
    let registry = registry_with(&[("d1", "tok-1"), ("d2", "tok-2"), ("d3", "tok-3")]).await;
    let sink = Arc::new(ScriptedSink::with_latency(Duration::from_millis(100)));
    let engine = DispatchEngine::new(registry, sink.clone(), &config(1, 1));

    let deadline = Instant::now() + Duration::from_millis(150);
    let result = engine
        .dispatch_with_deadline(payload(), DispatchTarget::AllActive, Some(deadline))
        .await
        .unwrap();

    assert_eq!(result.target_count, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert!(result.invalid_tokens.is_empty());

    let skipped = &result.failures[0];
    assert_eq!(skipped.token, "tok-3");
    assert_eq!(skipped.kind, DeliveryOutcome::TransientFailure);
    assert_eq!(skipped.attempts, 0);
    assert_eq!(skipped.reason, DEADLINE_NOT_ATTEMPTED);
    assert_eq!(sink.calls_for("tok-3"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_configured_deadline_applies_to_dispatch() {
    let registry = registry_with(&[("d1", "tok-1"), ("d2", "tok-2")]).await;
    let sink = Arc::new(ScriptedSink::with_latency(Duration::from_millis(100)));
    let dispatch_config = DispatchConfig {
        max_in_flight: 1,
        deadline_ms: Some(50),
        ..DispatchConfig::default()
    };
    let engine = DispatchEngine::new(registry, sink.clone(), &dispatch_config);

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);
    assert_eq!(sink.total_calls(), 1);
}

/// Registry whose reads or writes can be made to fail
struct FlakyRegistry {
    inner: InMemoryDeviceRegistrationRepository,
    fail_reads: bool,
}

#[async_trait]
impl DeviceRegistrationRepository for FlakyRegistry {
    async fn init_schema(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn register(
        &self,
        device_id: &str,
        token: &str,
    ) -> Result<DeviceRegistration, RegistryError> {
        self.inner.register(device_id, token).await
    }

    async fn get_active_tokens(&self) -> Result<Vec<String>, RegistryError> {
        if self.fail_reads {
            return Err(RegistryError::QueryError("database is locked".into()));
        }
        self.inner.get_active_tokens().await
    }

    async fn get_by_device(&self, device_id: &str) -> Result<DeviceRegistration, RegistryError> {
        self.inner.get_by_device(device_id).await
    }

    async fn list_registrations(&self) -> Result<Vec<DeviceRegistration>, RegistryError> {
        self.inner.list_registrations().await
    }

    async fn deactivate(&self, _token: &str) -> Result<u64, RegistryError> {
        Err(RegistryError::QueryError("read-only database".into()))
    }
}

#[tokio::test]
async fn test_deactivation_failure_does_not_fail_dispatch() {
    let inner = InMemoryDeviceRegistrationRepository::new();
    inner.register("d1", "tok-1").await.unwrap();
    let registry = Arc::new(FlakyRegistry {
        inner,
        fail_reads: false,
    });
    let sink = Arc::new(ScriptedSink::default().script(
        "tok-1",
        vec![SendOutcome::PermanentInvalidToken("UNREGISTERED".into())],
    ));
    let engine = DispatchEngine::new(registry.clone(), sink, &config(4, 1));

    let result = engine.dispatch(payload(), DispatchTarget::AllActive).await.unwrap();

    assert_eq!(result.failure_count, 1);
    assert!(result.invalid_tokens.contains("tok-1"));
    assert_eq!(registry.get_active_tokens().await.unwrap(), vec!["tok-1".to_string()]);
}

#[tokio::test]
async fn test_unreadable_registry_is_the_only_dispatch_error() {
    let registry = Arc::new(FlakyRegistry {
        inner: InMemoryDeviceRegistrationRepository::new(),
        fail_reads: true,
    });
    let sink = Arc::new(ScriptedSink::default());
    let engine = DispatchEngine::new(registry, sink.clone(), &config(4, 1));

    let err = engine
        .dispatch(payload(), DispatchTarget::AllActive)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::QueryError(_)));
    assert_eq!(sink.total_calls(), 0);
}
