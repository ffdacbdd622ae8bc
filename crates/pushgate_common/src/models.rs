// --- File: crates/pushgate_common/src/models.rs ---

// Data structures shared by the registry, the dispatch engine and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a device registration token
///
/// One record exists per `device_id`. The token is opaque text issued by the
/// client SDK and is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// Backend-assigned identifier, increasing in registration order
    pub id: Option<i64>,

    /// Caller-chosen logical device identifier
    pub device_id: String,

    /// The current delivery token
    pub token: String,

    /// When this device first registered
    pub registered_at: DateTime<Utc>,

    /// When the token was last refreshed
    pub updated_at: DateTime<Utc>,

    /// Cleared once the provider reports the token as permanently invalid
    pub active: bool,
}

impl DeviceRegistration {
    /// Create a new, active device registration stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `device_id` - The logical device identifier
    /// * `token` - The delivery token
    ///
    /// # Returns
    ///
    /// A new device registration with `registered_at == updated_at`
    pub fn new(device_id: String, token: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            device_id,
            token,
            registered_at: now,
            updated_at: now,
            active: true,
        }
    }
}

/// A notification to deliver
///
/// `data` is handed to the client untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationPayload {
    /// Short display string
    pub title: String,

    /// Longer display string
    pub body: String,

    /// Opaque key-value data for the client app
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    /// Adds one data entry, replacing any previous value for `key`.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}
