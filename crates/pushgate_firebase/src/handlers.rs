//! HTTP handlers for device registration and notification dispatch
//!
//! Every response body carries a `success` flag and, on failure, an `error`
//! message. Status codes follow [`HttpStatusCode`] for the underlying
//! [`PushgateError`].

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pushgate_common::{config_error, HttpStatusCode, NotificationPayload, PushgateError};
use pushgate_db::{DeviceRegistration, DeviceRegistrationRepository};
use pushgate_dispatch::{DispatchEngine, DispatchResult, DispatchTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Shared state for the handlers
#[derive(Clone)]
pub struct FirebaseState {
    /// The token registry
    pub registry: Arc<dyn DeviceRegistrationRepository>,

    /// Present only when Firebase credentials were loaded at startup
    pub engine: Option<Arc<DispatchEngine>>,
}

impl FirebaseState {
    pub fn new(
        registry: Arc<dyn DeviceRegistrationRepository>,
        engine: Option<Arc<DispatchEngine>>,
    ) -> Self {
        Self { registry, engine }
    }

    pub fn firebase_ready(&self) -> bool {
        self.engine.is_some()
    }
}

fn status_of(err: &PushgateError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// A registration as exposed over HTTP
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceView {
    pub id: Option<i64>,
    pub device_id: String,
    pub token: String,
    /// RFC 3339
    pub registered_at: String,
    /// RFC 3339
    pub updated_at: String,
    pub active: bool,
}

impl From<DeviceRegistration> for DeviceView {
    fn from(registration: DeviceRegistration) -> Self {
        Self {
            id: registration.id,
            device_id: registration.device_id,
            token: registration.token,
            registered_at: registration.registered_at.to_rfc3339(),
            updated_at: registration.updated_at.to_rfc3339(),
            active: registration.active,
        }
    }
}

/// Service banner returned by `GET /`
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusResponse {
    pub message: String,
    pub status: String,
    /// "initialized" or "not initialized"
    pub firebase_status: String,
    /// "healthy" or "unavailable"
    pub registry_status: String,
    pub endpoints: Vec<String>,
}

/// Request body for registering a device
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterDeviceRequest {
    /// Caller-chosen device identifier
    #[serde(default)]
    pub device_id: String,

    /// The FCM registration token issued to the device
    #[serde(default)]
    pub fcm_token: String,
}

/// Response body for the register device endpoint
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterDeviceResponse {
    pub success: bool,
    pub device: Option<DeviceView>,
    /// Number of known devices after this registration
    pub total_devices: Option<usize>,
    pub error: Option<String>,
}

/// Response body for the device listing
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DevicesResponse {
    pub success: bool,
    pub devices: Vec<DeviceView>,
    pub count: usize,
    pub error: Option<String>,
}

/// Response body for a single device lookup
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceResponse {
    pub success: bool,
    pub device: Option<DeviceView>,
    pub error: Option<String>,
}

fn default_title() -> String {
    "Test Notification".to_string()
}

fn default_body() -> String {
    "This is a test notification".to_string()
}

/// Request body for sending a notification
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendNotificationRequest {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_body")]
    pub body: String,

    /// Custom key-value data for the client app
    #[serde(default)]
    pub data: BTreeMap<String, String>,

    /// Send to this token only; omitted or "all" targets every active device
    #[serde(default)]
    pub target_token: Option<String>,

    /// Stop starting new deliveries after this many milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Response body for the send notification endpoint
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendNotificationResponse {
    /// True when every target was delivered
    pub success: bool,
    pub title: String,
    pub body: String,
    pub result: Option<DispatchResult>,
    pub error: Option<String>,
}

/// Handler for the service banner
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service status", body = StatusResponse)
    ),
    tag = "Pushgate"
))]
pub async fn status_handler(State(state): State<Arc<FirebaseState>>) -> Json<StatusResponse> {
    let registry_status = if state.registry.is_healthy().await {
        "healthy"
    } else {
        "unavailable"
    };
    let firebase_status = if state.firebase_ready() {
        "initialized"
    } else {
        "not initialized"
    };

    Json(StatusResponse {
        message: "Pushgate push notification server".to_string(),
        status: "running".to_string(),
        firebase_status: firebase_status.to_string(),
        registry_status: registry_status.to_string(),
        endpoints: vec![
            "/register-device - POST (register FCM token)".to_string(),
            "/devices - GET (show registered devices)".to_string(),
            "/devices/{device_id} - GET (show one device)".to_string(),
            "/send-notification - POST (send push notification)".to_string(),
        ],
    })
}

/// Handler for registering a device for push notifications
///
/// Registering the same device again replaces its token and reactivates it.
///
/// # Responses
///
/// - 200 OK: Device registered
/// - 400 Bad Request: Empty `device_id` or `fcm_token`
/// - 500 Internal Server Error: Registry failure
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/register-device",
    request_body = RegisterDeviceRequest,
    responses(
        (status = 200, description = "Device registered successfully", body = RegisterDeviceResponse),
        (status = 400, description = "Bad Request", body = RegisterDeviceResponse),
        (status = 500, description = "Internal Server Error", body = RegisterDeviceResponse)
    ),
    tag = "Pushgate"
))]
pub async fn register_device_handler(
    State(state): State<Arc<FirebaseState>>,
    Json(payload): Json<RegisterDeviceRequest>,
) -> Response {
    debug!("Registering device: {}", payload.device_id);

    let registered = match state
        .registry
        .register(&payload.device_id, &payload.fcm_token)
        .await
    {
        Ok(registration) => registration,
        Err(err) => {
            error!("Failed to register device: {}", err);
            let err = PushgateError::from(err);
            return (
                status_of(&err),
                Json(RegisterDeviceResponse {
                    success: false,
                    device: None,
                    total_devices: None,
                    error: Some(err.to_string()),
                }),
            )
                .into_response();
        }
    };

    info!("Successfully registered device: {}", registered.device_id);
    let total_devices = state
        .registry
        .list_registrations()
        .await
        .map(|all| all.len())
        .ok();

    Json(RegisterDeviceResponse {
        success: true,
        device: Some(registered.into()),
        total_devices,
        error: None,
    })
    .into_response()
}

/// Handler listing every registration, active or not
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "All registered devices", body = DevicesResponse),
        (status = 500, description = "Internal Server Error", body = DevicesResponse)
    ),
    tag = "Pushgate"
))]
pub async fn list_devices_handler(State(state): State<Arc<FirebaseState>>) -> Response {
    match state.registry.list_registrations().await {
        Ok(registrations) => {
            let devices: Vec<DeviceView> = registrations.into_iter().map(Into::into).collect();
            Json(DevicesResponse {
                success: true,
                count: devices.len(),
                devices,
                error: None,
            })
            .into_response()
        }
        Err(err) => {
            error!("Failed to list devices: {}", err);
            let err = PushgateError::from(err);
            (
                status_of(&err),
                Json(DevicesResponse {
                    success: false,
                    devices: Vec::new(),
                    count: 0,
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Handler returning one registration
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/devices/{device_id}",
    params(
        ("device_id" = String, Path, description = "Device identifier used at registration")
    ),
    responses(
        (status = 200, description = "The registration", body = DeviceResponse),
        (status = 404, description = "Unknown device", body = DeviceResponse),
        (status = 500, description = "Internal Server Error", body = DeviceResponse)
    ),
    tag = "Pushgate"
))]
pub async fn get_device_handler(
    State(state): State<Arc<FirebaseState>>,
    Path(device_id): Path<String>,
) -> Response {
    match state.registry.get_by_device(&device_id).await {
        Ok(registration) => Json(DeviceResponse {
            success: true,
            device: Some(registration.into()),
            error: None,
        })
        .into_response(),
        Err(err) => {
            let err = PushgateError::from(err);
            (
                status_of(&err),
                Json(DeviceResponse {
                    success: false,
                    device: None,
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Handler for sending a push notification
///
/// Sends to every active device, or to `target_token` alone. Per-device
/// failures are reported in `result` and never fail the request.
///
/// # Responses
///
/// - 200 OK: Dispatch completed (possibly with zero targets)
/// - 500 Internal Server Error: Firebase not configured or registry unreadable
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/send-notification",
    request_body = SendNotificationRequest,
    responses(
        (status = 200, description = "Dispatch completed", body = SendNotificationResponse),
        (status = 500, description = "Firebase not configured or registry unavailable", body = SendNotificationResponse)
    ),
    tag = "Pushgate"
))]
pub async fn send_notification_handler(
    State(state): State<Arc<FirebaseState>>,
    Json(request): Json<SendNotificationRequest>,
) -> Response {
    let failure = |err: PushgateError, title: String, body: String| {
        (
            status_of(&err),
            Json(SendNotificationResponse {
                success: false,
                title,
                body,
                result: None,
                error: Some(err.to_string()),
            }),
        )
            .into_response()
    };

    let Some(engine) = state.engine.as_ref() else {
        error!("Send requested but Firebase is not initialized");
        return failure(
            config_error("Firebase not initialized. Please add firebase-service-account.json"),
            request.title,
            request.body,
        );
    };

    let target = DispatchTarget::from(request.target_token);
    let payload = NotificationPayload {
        title: request.title.clone(),
        body: request.body.clone(),
        data: request.data,
    };

    let outcome = match request.timeout_ms {
        Some(ms) => {
            let deadline = Instant::now() + Duration::from_millis(ms);
            engine
                .dispatch_with_deadline(payload, target, Some(deadline))
                .await
        }
        None => engine.dispatch(payload, target).await,
    };

    match outcome {
        Ok(result) => Json(SendNotificationResponse {
            success: result.is_complete(),
            title: request.title,
            body: request.body,
            result: Some(result),
            error: None,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to resolve notification targets: {}", err);
            failure(PushgateError::from(err), request.title, request.body)
        }
    }
}
