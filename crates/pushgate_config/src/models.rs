// --- File: crates/pushgate_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. "sqlite:data/pushgate.db", overridable via PUSHGATE__DATABASE__URL
    #[serde(default)]
    pub max_connections: Option<u32>,
}

// --- Firebase Config ---
// Holds non-secret FCM settings. The service account key itself stays on disk.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    pub key_path: Option<String>,
    /// Base URL of the FCM API, without the `/v1/...` path.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

// --- Dispatch Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    /// Upper bound on concurrent sink calls for one dispatch.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Extra attempts granted to a target after a transient failure.
    #[serde(default = "default_retry_bound")]
    pub retry_bound: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: f64,
    /// Default deadline for a whole dispatch, none means unbounded.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_max_in_flight() -> usize {
    16
}

fn default_retry_bound() -> u32 {
    1
}

fn default_retry_initial_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_retry_backoff_multiplier() -> f64 {
    2.0
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            retry_bound: default_retry_bound(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            deadline_ms: None,
        }
    }
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_database: bool,
    #[serde(default)]
    pub use_firebase: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub firebase: Option<FirebaseConfig>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            use_database: false,
            use_firebase: false,
            database: None,
            firebase: None,
            dispatch: DispatchConfig::default(),
        }
    }
}
