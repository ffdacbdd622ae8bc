//! Authentication module for Firebase Cloud Messaging
//!
//! Exchanges a Google service account key for an OAuth2 access token with the
//! FCM messaging scope.

use crate::client::FirebaseError;
use pushgate_config::FirebaseConfig;
use std::path::Path;
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator};

/// OAuth2 scope required by the FCM HTTP v1 API
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Obtains an OAuth2 access token for Firebase Cloud Messaging
///
/// # Errors
///
/// Returns [`FirebaseError::ConfigError`] when `key_path` is missing and
/// [`FirebaseError::AuthError`] when the key cannot be read or Google refuses
/// to issue a token.
pub async fn get_firebase_auth_token(config: &FirebaseConfig) -> Result<String, FirebaseError> {
    let key_path = config
        .key_path
        .as_deref()
        .ok_or_else(|| FirebaseError::ConfigError("Missing key_path in FirebaseConfig".into()))?;

    let sa_key = read_service_account_key(Path::new(key_path))
        .await
        .map_err(|e| {
            FirebaseError::AuthError(format!("cannot read service account key {}: {}", key_path, e))
        })?;

    let auth = ServiceAccountAuthenticator::builder(sa_key)
        .build()
        .await
        .map_err(|e| FirebaseError::AuthError(e.to_string()))?;

    let auth_token = auth
        .token(&[FCM_SCOPE])
        .await
        .map_err(|e| FirebaseError::AuthError(e.to_string()))?;

    match auth_token.token() {
        Some(token) => Ok(token.to_string()),
        None => Err(FirebaseError::AuthError("No token available".into())),
    }
}
