use axum::{
    routing::{get, post},
    Router,
};
use pushgate_config::AppConfig;
use pushgate_db::DeviceRegistrationRepository;
use pushgate_dispatch::DispatchEngine;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::FirebaseClient;
use crate::handlers::{
    get_device_handler, list_devices_handler, register_device_handler,
    send_notification_handler, status_handler, FirebaseState,
};

impl FirebaseState {
    /// Build the handler state from the application configuration
    ///
    /// Firebase is considered initialized only when `use_firebase` is set, a
    /// `project_id` is configured and the service account key file exists.
    /// Otherwise registration still works and sends answer 500.
    pub fn from_config(
        config: &AppConfig,
        registry: Arc<dyn DeviceRegistrationRepository>,
    ) -> Self {
        let firebase = match (&config.firebase, config.use_firebase) {
            (Some(firebase), true) => firebase,
            _ => {
                info!("Firebase disabled by configuration");
                return Self::new(registry, None);
            }
        };

        if firebase.project_id.is_none() {
            warn!("Firebase enabled but no project_id is configured");
            return Self::new(registry, None);
        }
        match firebase.key_path.as_deref() {
            Some(key_path) if Path::new(key_path).exists() => {}
            Some(key_path) => {
                warn!("Firebase service account key not found at {}", key_path);
                return Self::new(registry, None);
            }
            None => {
                warn!("Firebase enabled but no key_path is configured");
                return Self::new(registry, None);
            }
        }

        let client = Arc::new(FirebaseClient::new(firebase.clone()));
        let engine = DispatchEngine::new(registry.clone(), client, &config.dispatch);
        info!("Firebase initialized for project {:?}", firebase.project_id);
        Self::new(registry, Some(Arc::new(engine)))
    }
}

/// Create the notification routes
///
/// Paths are relative; the backend nests them under `/api`.
pub fn routes(state: Arc<FirebaseState>) -> Router {
    info!("Notification routes initialized");

    Router::new()
        .route("/", get(status_handler))
        .route("/register-device", post(register_device_handler))
        .route("/devices", get(list_devices_handler))
        .route("/devices/{device_id}", get(get_device_handler))
        .route("/send-notification", post(send_notification_handler))
        .with_state(state)
}
