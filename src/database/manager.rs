use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::models::Tenant;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid tenant database name: {0}")]
    InvalidTenantName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classifies a query error, lifting unique violations into `Conflict`.
    pub fn from_query(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::Conflict(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => DatabaseError::Unavailable(err.to_string()),
            _ => DatabaseError::Sqlx(err),
        }
    }

    /// Any failure to reach a database while connecting is an availability problem.
    pub fn from_connect(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_) => DatabaseError::InvalidDatabaseUrl,
            other => DatabaseError::Unavailable(other.to_string()),
        }
    }
}

/// Name of a tenant's isolated database. Only constructible from a directory record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLocator(String);

impl StorageLocator {
    pub fn for_tenant(tenant: &Tenant, reserved: &str) -> Result<Self, DatabaseError> {
        let name = tenant.tenant_code.trim();
        if !is_valid_db_name(name) || name.eq_ignore_ascii_case(reserved) {
            return Err(DatabaseError::InvalidTenantName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate database names to prevent injection. Accepts `[A-Za-z0-9_-]{1,63}` and
/// rejects the administrative `postgres` database and `template*` names.
fn is_valid_db_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    if lower == "postgres" || lower.starts_with("template") {
        return false;
    }
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Connection pool cache for the directory database and every tenant database
pub struct DatabaseManager {
    config: DatabaseConfig,
    pools: RwLock<HashMap<String, PgPool>>,
}

impl DatabaseManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn directory_database(&self) -> &str {
        &self.config.directory_database
    }

    /// Get the shared tenant directory pool
    pub async fn directory_pool(&self) -> Result<PgPool, DatabaseError> {
        let name = self.config.directory_database.clone();
        self.get_pool(&name).await
    }

    /// Get tenant database pool (validated locator)
    pub async fn tenant_pool(&self, locator: &StorageLocator) -> Result<PgPool, DatabaseError> {
        self.get_pool(locator.as_str()).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, database_name: &str) -> Result<PgPool, DatabaseError> {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(database_name) {
                return Ok(pool.clone());
            }
        }

        let base = self
            .config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let connection_string = build_connection_string(base, database_name)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connection_timeout))
            .connect(&connection_string)
            .await
            .map_err(DatabaseError::from_connect)?;

        // Another request may have raced us here; keep whichever pool landed first.
        let mut pools = self.pools.write().await;
        let pool = pools
            .entry(database_name.to_string())
            .or_insert_with(|| {
                info!("Created database pool for: {}", database_name);
                pool
            })
            .clone();
        Ok(pool)
    }

    /// Pings the directory pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.directory_pool().await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(())
    }
}

/// Swaps the database name into the path of the base URL, keeping credentials and query.
fn build_connection_string(base: &str, database_name: &str) -> Result<String, DatabaseError> {
    let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    url.set_path(&format!("/{}", database_name));
    Ok(url.into())
}
