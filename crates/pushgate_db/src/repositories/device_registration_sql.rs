//! SQL implementation of the device registration repository
//!
//! Timestamps are stored as RFC 3339 text and `active` as 0/1, because the
//! `Any` driver cannot decode `DateTime<Utc>` or booleans portably.

use crate::client::DbDialect;
use crate::error::RegistryError;
use crate::repositories::device_registration::{
    validate_registration, DeviceRegistration, DeviceRegistrationRepository,
};
use crate::DbClient;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pushgate_common::token_prefix;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

const SELECT_COLUMNS: &str = "id, device_id, token, registered_at, updated_at, active";

/// SQL implementation of the device registration repository
#[derive(Debug, Clone)]
pub struct SqlDeviceRegistrationRepository {
    /// The database client
    db_client: DbClient,
}

impl SqlDeviceRegistrationRepository {
    /// Create a new SQL device registration repository
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RegistryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RegistryError::QueryError(format!("bad {} value {:?}: {}", column, raw, e)))
}

fn registration_from_row(row: &AnyRow) -> Result<DeviceRegistration, RegistryError> {
    let registered_at: String = row.try_get("registered_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let active: i64 = row.try_get("active")?;

    Ok(DeviceRegistration {
        id: Some(row.try_get("id")?),
        device_id: row.try_get("device_id")?,
        token: row.try_get("token")?,
        registered_at: parse_timestamp("registered_at", &registered_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        active: active != 0,
    })
}

#[async_trait]
impl DeviceRegistrationRepository for SqlDeviceRegistrationRepository {
    async fn init_schema(&self) -> Result<(), RegistryError> {
        debug!("Initializing device registration schema");

        let id_column = match self.db_client.dialect() {
            DbDialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
            DbDialect::Postgres => "id BIGSERIAL PRIMARY KEY",
        };

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS device_registrations (
                {},
                device_id TEXT NOT NULL UNIQUE,
                token TEXT NOT NULL,
                registered_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
            id_column
        );
        self.db_client.execute(&create_table).await?;

        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_device_registrations_token \
                 ON device_registrations (token)",
            )
            .await?;

        info!("Device registration schema initialized successfully");
        Ok(())
    }

    async fn register(
        &self,
        device_id: &str,
        token: &str,
    ) -> Result<DeviceRegistration, RegistryError> {
        validate_registration(device_id, token)?;
        debug!("Registering device: {}", device_id);

        // One statement, so the upsert commits or fails as a whole
        let query = format!(
            r#"
            INSERT INTO device_registrations (device_id, token, registered_at, updated_at, active)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (device_id) DO UPDATE
            SET token = excluded.token, updated_at = excluded.updated_at, active = 1
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );

        let now = format_timestamp(Utc::now());
        let row = sqlx::query(&query)
            .bind(device_id)
            .bind(token)
            .bind(&now)
            .bind(&now)
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to upsert device registration: {}", e);
                RegistryError::QueryError(e.to_string())
            })?;

        let registration = registration_from_row(&row)?;
        info!(
            "Registered device {} with token {}",
            device_id,
            token_prefix(token)
        );
        Ok(registration)
    }

    async fn get_active_tokens(&self) -> Result<Vec<String>, RegistryError> {
        let rows = sqlx::query(
            "SELECT token FROM device_registrations WHERE active = 1 ORDER BY id",
        )
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to load active tokens: {}", e);
            RegistryError::QueryError(e.to_string())
        })?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("token").map_err(RegistryError::from))
            .collect()
    }

    async fn get_by_device(&self, device_id: &str) -> Result<DeviceRegistration, RegistryError> {
        debug!("Finding device registration for device: {}", device_id);

        let query = format!(
            "SELECT {} FROM device_registrations WHERE device_id = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(device_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find device registration: {}", e);
                RegistryError::QueryError(e.to_string())
            })?;

        match row {
            Some(row) => registration_from_row(&row),
            None => Err(RegistryError::NotFound(device_id.to_string())),
        }
    }

    async fn list_registrations(&self) -> Result<Vec<DeviceRegistration>, RegistryError> {
        let query = format!(
            "SELECT {} FROM device_registrations ORDER BY id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list device registrations: {}", e);
                RegistryError::QueryError(e.to_string())
            })?;

        rows.iter().map(registration_from_row).collect()
    }

    async fn deactivate(&self, token: &str) -> Result<u64, RegistryError> {
        let result = sqlx::query(
            "UPDATE device_registrations SET active = 0 WHERE token = $1 AND active = 1",
        )
        .bind(token)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to deactivate token: {}", e);
            RegistryError::QueryError(e.to_string())
        })?;

        let changed = result.rows_affected();
        if changed > 0 {
            info!(
                "Deactivated {} registration(s) for token {}",
                changed,
                token_prefix(token)
            );
        }
        Ok(changed)
    }

    async fn is_healthy(&self) -> bool {
        self.db_client.is_healthy().await
    }
}
