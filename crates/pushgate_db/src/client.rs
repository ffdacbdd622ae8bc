//! Database client for pushgate
//!
//! This module provides a database client that is designed to be database agnostic,
//! using SQLx's `Any` driver as the underlying database library.

use crate::error::RegistryError;
use pushgate_config::{AppConfig, DatabaseConfig};
use sqlx::pool::PoolOptions;
use sqlx::Pool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQL dialect of the connected database
///
/// Only the schema DDL differs between dialects; queries are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDialect {
    Sqlite,
    Postgres,
}

impl DbDialect {
    fn from_url(db_url: &str) -> Self {
        if db_url.starts_with("postgres:") || db_url.starts_with("postgresql:") {
            DbDialect::Postgres
        } else {
            DbDialect::Sqlite
        }
    }
}

/// Database client for pushgate
///
/// This client provides a database-agnostic interface to the database,
/// using SQLx as the underlying database library.
#[derive(Debug, Clone)]
pub struct DbClient {
    /// The database connection pool
    pool: Pool<sqlx::Any>,

    /// The dialect the pool speaks
    dialect: DbDialect,
}

impl DbClient {
    /// Create a new database client from the application configuration
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    ///
    /// * The database configuration is missing
    /// * The database URL is empty
    /// * The database connection fails
    pub async fn new(config: &Arc<AppConfig>) -> Result<Self, RegistryError> {
        let db_config = config.database.as_ref().ok_or_else(|| {
            RegistryError::ConfigError("Database configuration is missing".to_string())
        })?;

        Self::from_config(db_config).await
    }

    /// Create a new database client from a database configuration
    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, RegistryError> {
        if db_config.url.is_empty() {
            return Err(RegistryError::ConfigError(
                "Database URL is empty".to_string(),
            ));
        }

        let max_connections = db_config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let pool = Self::create_pool(&db_config.url, max_connections).await?;

        Ok(Self {
            pool,
            dialect: DbDialect::from_url(&db_config.url),
        })
    }

    /// Create a new database client from a database URL
    ///
    /// # Arguments
    ///
    /// * `db_url` - The database URL, e.g. `sqlite::memory:` or `sqlite:data/pushgate.db`
    pub async fn from_url(db_url: &str) -> Result<Self, RegistryError> {
        if db_url.is_empty() {
            return Err(RegistryError::ConfigError(
                "Database URL is empty".to_string(),
            ));
        }

        let pool = Self::create_pool(db_url, DEFAULT_MAX_CONNECTIONS).await?;

        Ok(Self {
            pool,
            dialect: DbDialect::from_url(db_url),
        })
    }

    /// Create a connection pool
    ///
    /// For file-backed SQLite the parent directory and the file are created when
    /// missing. In-memory SQLite is limited to one connection that is never
    /// recycled, since every connection would otherwise see its own database.
    async fn create_pool(db_url: &str, max_connections: u32) -> Result<Pool<sqlx::Any>, RegistryError> {
        debug!("Creating database pool with URL: {}", db_url);

        sqlx::any::install_default_drivers();

        let mut pool_options = PoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600));

        if db_url.starts_with("sqlite:") {
            // Handle both "sqlite:example.db" and "sqlite://example.db" formats
            let db_path = db_url
                .strip_prefix("sqlite://")
                .or_else(|| db_url.strip_prefix("sqlite:"))
                .unwrap_or(db_url);
            let db_path = db_path.split('?').next().unwrap_or(db_path);

            if db_path.contains(":memory:") || db_path.is_empty() {
                debug!("Using a single connection for in-memory SQLite");
                pool_options = pool_options
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
            } else {
                let path = std::path::Path::new(db_path);
                if let Some(dir) = path.parent() {
                    if !dir.as_os_str().is_empty() && !dir.exists() {
                        debug!("Creating directory for SQLite database: {:?}", dir);
                        std::fs::create_dir_all(dir).map_err(|e| {
                            error!("Failed to create directory for SQLite database: {}", e);
                            RegistryError::PoolError(format!("Failed to create directory: {}", e))
                        })?;
                    }
                }

                if !path.exists() {
                    debug!("Creating empty SQLite database file: {}", db_path);
                    std::fs::File::create(path).map_err(|e| {
                        error!("Failed to create SQLite database file: {}", e);
                        RegistryError::PoolError(format!("Failed to create database file: {}", e))
                    })?;
                }
            }
        }

        let pool = pool_options
            .connect_with(sqlx::any::AnyConnectOptions::from_str(db_url)?)
            .await
            .map_err(|e| {
                error!("Failed to create database pool: {}", e);
                RegistryError::PoolError(e.to_string())
            })?;

        info!("Database pool created successfully");
        Ok(pool)
    }

    /// Get the database connection pool
    pub fn pool(&self) -> &Pool<sqlx::Any> {
        &self.pool
    }

    /// Get the SQL dialect of this connection
    pub fn dialect(&self) -> DbDialect {
        self.dialect
    }

    /// Execute a statement that returns no rows
    ///
    /// # Returns
    ///
    /// The number of rows affected
    pub async fn execute(&self, query: &str) -> Result<u64, RegistryError> {
        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| RegistryError::QueryError(e.to_string()))
    }

    /// Check if the database is healthy by executing a trivial query
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

impl std::fmt::Display for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbClient({:?})", self.dialect)
    }
}
