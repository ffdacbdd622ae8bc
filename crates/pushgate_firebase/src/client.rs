//! Firebase Cloud Messaging client module
//!
//! A client for the FCM HTTP v1 API that sends one message per device token.
//! [`FirebaseClient`] implements [`NotificationSink`], translating FCM
//! responses into delivery outcomes for the dispatch engine.

use crate::auth::get_firebase_auth_token;
use async_trait::async_trait;
use pushgate_common::{token_prefix, NotificationPayload};
use pushgate_config::FirebaseConfig;
use pushgate_dispatch::{NotificationSink, SendOutcome};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Production FCM endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://fcm.googleapis.com";

/// How long an OAuth2 access token is reused (Google issues them for an hour)
pub const TOKEN_CACHE_TTL: Duration = Duration::from_secs(50 * 60);

/// FCM error codes meaning the token will never work again
pub const PERMANENT_ERROR_CODES: [&str; 2] = ["UNREGISTERED", "SENDER_ID_MISMATCH"];

/// Malformed request; only a token problem when FCM names the token field
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";

/// Request field FCM blames when the registration token is malformed
const TOKEN_FIELD: &str = "message.token";

/// Errors that can occur when interacting with the Firebase Cloud Messaging API
#[derive(Error, Debug)]
pub enum FirebaseError {
    /// Error during authentication with Firebase
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error during HTTP request to Firebase API
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error response from the Firebase API
    #[error("Firebase API error ({status}): {message}")]
    ApiError {
        status: u16,
        /// FCM `errorCode`, or the Google RPC status when no detail is given
        code: Option<String>,
        message: String,
        /// FCM pointed at `message.token` as the offending field
        token_rejected: bool,
    },
}

impl FirebaseError {
    /// True when FCM says the token itself is dead
    pub fn is_invalid_token(&self) -> bool {
        match self {
            FirebaseError::ApiError {
                status,
                code,
                token_rejected,
                ..
            } => {
                *status == StatusCode::NOT_FOUND.as_u16()
                    || *token_rejected
                    || code
                        .as_deref()
                        .is_some_and(|code| PERMANENT_ERROR_CODES.contains(&code))
            }
            _ => false,
        }
    }

    /// True when FCM refused the message itself; resending it cannot succeed
    pub fn is_rejected_request(&self) -> bool {
        match self {
            FirebaseError::ApiError { status, code, .. } => {
                *status == StatusCode::BAD_REQUEST.as_u16()
                    || code.as_deref() == Some(INVALID_ARGUMENT)
            }
            _ => false,
        }
    }
}

/// Map a send result onto a delivery outcome
pub fn classify(result: Result<String, FirebaseError>) -> SendOutcome {
    match result {
        Ok(message_id) => SendOutcome::Delivered(message_id),
        Err(err) if err.is_invalid_token() => SendOutcome::PermanentInvalidToken(err.to_string()),
        Err(err) if err.is_rejected_request() => SendOutcome::Rejected(err.to_string()),
        Err(err) => SendOutcome::TransientError(err.to_string()),
    }
}

/// A message to be sent via Firebase Cloud Messaging
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FcmMessage {
    /// The message payload
    pub message: Message,
}

/// The message payload for Firebase Cloud Messaging
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Message {
    /// Registration token of the target device
    pub token: String,

    /// The notification to be displayed on the user's device
    pub notification: Notification,

    /// Custom key-value data for the client app
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

/// The notification to be displayed on the user's device
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Notification {
    /// The title of the notification
    pub title: String,

    /// The body text of the notification
    pub body: String,
}

impl FcmMessage {
    /// Build the FCM request body for a single device
    pub fn for_token(token: &str, payload: &NotificationPayload) -> Self {
        Self {
            message: Message {
                token: token.to_string(),
                notification: Notification {
                    title: payload.title.clone(),
                    body: payload.body.clone(),
                },
                data: payload.data.clone(),
            },
        }
    }
}

/// Response from the Firebase Cloud Messaging API
#[derive(Debug, Deserialize)]
pub struct FcmResponse {
    /// "projects/{project_id}/messages/{message_id}"
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct FcmErrorResponse {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

/// One entry of `error.details`: an `FcmError` or a `google.rpc.BadRequest`
#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "fieldViolations", default)]
    field_violations: Vec<FieldViolation>,
}

#[derive(Debug, Deserialize)]
struct FieldViolation {
    #[serde(default)]
    field: String,
}

fn parse_api_error(status: StatusCode, body: &str) -> FirebaseError {
    match serde_json::from_str::<FcmErrorResponse>(body) {
        Ok(parsed) => {
            let details = &parsed.error.details;
            let code = details
                .iter()
                .find_map(|detail| detail.error_code.clone())
                .or(parsed.error.status);
            let token_rejected = code.as_deref() == Some(INVALID_ARGUMENT)
                && details
                    .iter()
                    .flat_map(|detail| &detail.field_violations)
                    .any(|violation| violation.field == TOKEN_FIELD);
            FirebaseError::ApiError {
                status: status.as_u16(),
                code,
                message: parsed.error.message,
                token_rejected,
            }
        }
        Err(_) => FirebaseError::ApiError {
            status: status.as_u16(),
            code: None,
            message: body.to_string(),
            token_rejected: false,
        },
    }
}

enum Credentials {
    ServiceAccount,
    Static(String),
}

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

/// Client for the Firebase Cloud Messaging HTTP v1 API
pub struct FirebaseClient {
    /// HTTP client for making requests to the FCM API
    client: Client,

    /// Project id and service account key path
    config: FirebaseConfig,

    api_base_url: String,
    credentials: Credentials,
    cached_token: Mutex<Option<CachedToken>>,
}

impl FirebaseClient {
    /// Creates a client that authenticates with the configured service account
    pub fn new(config: FirebaseConfig) -> Self {
        Self::build(config, Credentials::ServiceAccount)
    }

    /// Creates a client that always sends `token` as its bearer token
    ///
    /// Useful against the FCM emulator or a mock server.
    pub fn with_static_token(config: FirebaseConfig, token: impl Into<String>) -> Self {
        Self::build(config, Credentials::Static(token.into()))
    }

    fn build(config: FirebaseConfig, credentials: Credentials) -> Self {
        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client: Client::new(),
            config,
            api_base_url,
            credentials,
            cached_token: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.config.project_id.as_deref()
    }

    async fn access_token(&self) -> Result<String, FirebaseError> {
        if let Credentials::Static(token) = &self.credentials {
            return Ok(token.clone());
        }

        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.fetched_at.elapsed() < TOKEN_CACHE_TTL {
                return Ok(token.value.clone());
            }
        }

        debug!("Fetching a new FCM access token");
        let value = get_firebase_auth_token(&self.config).await?;
        *cached = Some(CachedToken {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    async fn forget_token(&self) {
        *self.cached_token.lock().await = None;
    }

    /// Sends a message via Firebase Cloud Messaging
    ///
    /// # Returns
    ///
    /// The message name assigned by FCM on success.
    ///
    /// # Errors
    ///
    /// * `ConfigError` if `project_id` is missing
    /// * `AuthError` if no access token can be obtained
    /// * `RequestError` on network failures
    /// * `ApiError` for any non-2xx response
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use pushgate_common::NotificationPayload;
    /// use pushgate_config::FirebaseConfig;
    /// use pushgate_firebase::client::{FcmMessage, FirebaseClient};
    ///
    /// async fn send_notification() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = FirebaseConfig {
    ///         project_id: Some("my-project-id".to_string()),
    ///         key_path: Some("/path/to/service-account.json".to_string()),
    ///         api_base_url: None,
    ///     };
    ///     let client = FirebaseClient::new(config);
    ///
    ///     let payload = NotificationPayload::new("Hello", "World").with_data("key1", "value1");
    ///     let message_id = client
    ///         .send_message(&FcmMessage::for_token("device-token", &payload))
    ///         .await?;
    ///     println!("Message sent with ID: {}", message_id);
    ///     Ok(())
    /// }
    /// ```
    pub async fn send_message(&self, message: &FcmMessage) -> Result<String, FirebaseError> {
        let project_id = self.project_id().ok_or_else(|| {
            FirebaseError::ConfigError("Missing project_id in FirebaseConfig".to_string())
        })?;

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base_url, project_id
        );

        let token = self.access_token().await?;

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.forget_token().await;
            }
            let error_text = response.text().await?;
            return Err(parse_api_error(status, &error_text));
        }

        let fcm_response: FcmResponse = response.json().await?;
        Ok(fcm_response.name)
    }
}

#[async_trait]
impl NotificationSink for FirebaseClient {
    async fn send(&self, token: &str, payload: &NotificationPayload) -> SendOutcome {
        let result = self
            .send_message(&FcmMessage::for_token(token, payload))
            .await;
        if let Err(err) = &result {
            warn!("FCM send to {} failed: {}", token_prefix(token), err);
        }
        classify(result)
    }
}
