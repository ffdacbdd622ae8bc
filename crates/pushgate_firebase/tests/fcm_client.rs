use pushgate_common::NotificationPayload;
use pushgate_config::{DispatchConfig, FirebaseConfig};
use pushgate_db::{DeviceRegistrationRepository, InMemoryDeviceRegistrationRepository};
use pushgate_dispatch::{
    DeliveryOutcome, DispatchEngine, DispatchTarget, NotificationSink, SendOutcome,
};
use pushgate_firebase::FirebaseClient;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = "/v1/projects/demo-project/messages:send";

fn client_for(server: &MockServer) -> FirebaseClient {
    FirebaseClient::with_static_token(
        FirebaseConfig {
            project_id: Some("demo-project".to_string()),
            key_path: None,
            api_base_url: Some(server.uri()),
        },
        "test-token",
    )
}

fn fcm_error(code: u16, status: &str, error_code: Option<&str>) -> serde_json::Value {
    let details = match error_code {
        Some(error_code) => json!([{
            "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
            "errorCode": error_code
        }]),
        None => json!([]),
    };
    json!({
        "error": {
            "code": code,
            "message": "request failed",
            "status": status,
            "details": details
        }
    })
}

#[tokio::test]
async fn test_successful_send_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "message": {
                "token": "tok-1",
                "notification": { "title": "Hi", "body": "there" },
                "data": { "kind": "greeting" }
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/demo-project/messages/0:1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = NotificationPayload::new("Hi", "there").with_data("kind", "greeting");

    assert_eq!(
        client.send("tok-1", &payload).await,
        SendOutcome::Delivered("projects/demo-project/messages/0:1".to_string())
    );
}

#[tokio::test]
async fn test_unregistered_token_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(fcm_error(404, "NOT_FOUND", Some("UNREGISTERED"))),
        )
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .send("tok-dead", &NotificationPayload::new("Hi", "there"))
        .await;

    assert!(matches!(outcome, SendOutcome::PermanentInvalidToken(_)));
}

#[tokio::test]
async fn test_malformed_token_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "The registration token is not a valid FCM registration token",
                "status": "INVALID_ARGUMENT",
                "details": [
                    {
                        "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                        "errorCode": "INVALID_ARGUMENT"
                    },
                    {
                        "@type": "type.googleapis.com/google.rpc.BadRequest",
                        "fieldViolations": [{ "field": "message.token" }]
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .send("not-a-token", &NotificationPayload::new("Hi", "there"))
        .await;

    assert!(matches!(outcome, SendOutcome::PermanentInvalidToken(_)));
}

#[tokio::test]
async fn test_invalid_argument_without_token_detail_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(fcm_error(400, "INVALID_ARGUMENT", Some("INVALID_ARGUMENT"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .send("tok-1", &NotificationPayload::new("Hi", "there"))
        .await;

    assert!(matches!(outcome, SendOutcome::Rejected(_)));
}

#[tokio::test]
async fn test_server_errors_and_quota_are_transient() {
    for (status, rpc_status, error_code) in [
        (503, "UNAVAILABLE", Some("UNAVAILABLE")),
        (500, "INTERNAL", Some("INTERNAL")),
        (429, "RESOURCE_EXHAUSTED", Some("QUOTA_EXCEEDED")),
        (401, "UNAUTHENTICATED", None),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(fcm_error(status, rpc_status, error_code)),
            )
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .send("tok-1", &NotificationPayload::new("Hi", "there"))
            .await;

        assert!(
            matches!(outcome, SendOutcome::TransientError(_)),
            "HTTP {} should be transient, got {:?}",
            status,
            outcome
        );
    }
}

#[tokio::test]
async fn test_unparseable_error_body_keeps_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html>not found</html>"))
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .send("tok-1", &NotificationPayload::new("Hi", "there"))
        .await;

    assert!(matches!(outcome, SendOutcome::PermanentInvalidToken(_)));
}

#[tokio::test]
async fn test_missing_project_id_is_transient_and_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = FirebaseClient::with_static_token(
        FirebaseConfig {
            project_id: None,
            key_path: None,
            api_base_url: Some(server.uri()),
        },
        "test-token",
    );

    let outcome = client
        .send("tok-1", &NotificationPayload::new("Hi", "there"))
        .await;
    assert!(matches!(outcome, SendOutcome::TransientError(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transient() {
    let client = FirebaseClient::with_static_token(
        FirebaseConfig {
            project_id: Some("demo-project".to_string()),
            key_path: None,
            api_base_url: Some("http://127.0.0.1:9".to_string()),
        },
        "test-token",
    );

    let outcome = client
        .send("tok-1", &NotificationPayload::new("Hi", "there"))
        .await;
    assert!(matches!(outcome, SendOutcome::TransientError(_)));
}

#[tokio::test]
async fn test_dispatch_through_fcm_deactivates_dead_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_string_contains("tok-dead"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(fcm_error(404, "NOT_FOUND", Some("UNREGISTERED"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_string_contains("tok-live"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": "projects/demo-project/messages/1" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
    registry.register("phone", "tok-live-1").await.unwrap();
    registry.register("old-tablet", "tok-dead").await.unwrap();
    registry.register("laptop", "tok-live-2").await.unwrap();

    let engine = DispatchEngine::new(
        registry.clone(),
        Arc::new(client_for(&server)),
        &DispatchConfig::default(),
    );
    let result = engine
        .dispatch(NotificationPayload::new("Hi", "there"), DispatchTarget::AllActive)
        .await
        .unwrap();

    assert_eq!(result.target_count, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert!(result.invalid_tokens.contains("tok-dead"));
    assert_eq!(
        registry.get_active_tokens().await.unwrap(),
        vec!["tok-live-1".to_string(), "tok-live-2".to_string()]
    );
}

#[tokio::test]
async fn test_bad_payload_leaves_every_token_active() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "Invalid data payload key: from",
                "status": "INVALID_ARGUMENT",
                "details": []
            }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryDeviceRegistrationRepository::new());
    registry.register("phone", "tok-a").await.unwrap();
    registry.register("tablet", "tok-b").await.unwrap();
    registry.register("laptop", "tok-c").await.unwrap();

    let engine = DispatchEngine::new(
        registry.clone(),
        Arc::new(client_for(&server)),
        &DispatchConfig::default(),
    );
    let result = engine
        .dispatch(
            NotificationPayload::new("Hi", "there").with_data("from", "x"),
            DispatchTarget::AllActive,
        )
        .await
        .unwrap();

    assert_eq!(result.target_count, 3);
    assert_eq!(result.success_count, 0);
    assert_eq!(result.failure_count, 3);
    assert!(result.invalid_tokens.is_empty());
    assert!(result
        .failures
        .iter()
        .all(|failure| failure.kind == DeliveryOutcome::RejectedFailure && failure.attempts == 1));
    assert_eq!(
        registry.get_active_tokens().await.unwrap(),
        vec!["tok-a".to_string(), "tok-b".to_string(), "tok-c".to_string()]
    );
}
