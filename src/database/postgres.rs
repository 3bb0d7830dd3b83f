use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Postgres};
use std::sync::Arc;
use tracing::debug;

use crate::database::manager::{DatabaseError, DatabaseManager, StorageLocator};
use crate::database::models::{AdminUser, Device, DeviceLog, NewAdminUser, NewDevice, Tenant};
use crate::database::storage::{StorageRouter, TenantDirectory, TenantStorage};

const TENANT_COLUMNS: &str = "id, tenant_code, tenant_name, del_flg, created_at, updated_at";
const DEVICE_COLUMNS: &str =
    "id, serial_no, device_name, auth_mode, is_active, deleted, created_at, updated_at";
const ADMIN_USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

/// Tenant registry stored in the shared directory database
pub struct PgTenantDirectory {
    manager: Arc<DatabaseManager>,
}

impl PgTenantDirectory {
    pub fn new(manager: Arc<DatabaseManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_active(&self, tenant_code: &str) -> Result<Option<Tenant>, DatabaseError> {
        let pool = self.manager.directory_pool().await?;
        let query = format!(
            "SELECT {} FROM tenants WHERE tenant_code = $1 AND del_flg = 0",
            TENANT_COLUMNS
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(tenant_code)
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, DatabaseError> {
        let pool = self.manager.directory_pool().await?;
        let query = format!(
            "SELECT {} FROM tenants WHERE del_flg = 0 ORDER BY tenant_code",
            TENANT_COLUMNS
        );
        sqlx::query_as::<_, Tenant>(&query)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.manager.health_check().await
    }
}

/// Hands out one pooled connection per request, taken from the tenant's own pool
pub struct PgStorageRouter {
    manager: Arc<DatabaseManager>,
}

impl PgStorageRouter {
    pub fn new(manager: Arc<DatabaseManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl StorageRouter for PgStorageRouter {
    async fn open(&self, tenant: &Tenant) -> Result<Box<dyn TenantStorage>, DatabaseError> {
        let locator = StorageLocator::for_tenant(tenant, self.manager.directory_database())?;
        let pool = self.manager.tenant_pool(&locator).await?;
        let conn = pool.acquire().await.map_err(DatabaseError::from_connect)?;
        debug!("Opened storage handle for tenant database: {}", locator);
        Ok(Box::new(PgTenantStorage { locator, conn }))
    }
}

/// Request-scoped connection to one tenant database. The connection goes back to the
/// pool when this is dropped.
pub struct PgTenantStorage {
    locator: StorageLocator,
    conn: PoolConnection<Postgres>,
}

impl Drop for PgTenantStorage {
    fn drop(&mut self) {
        debug!("Released storage handle for tenant database: {}", self.locator);
    }
}

#[async_trait]
impl TenantStorage for PgTenantStorage {
    fn locator(&self) -> &StorageLocator {
        &self.locator
    }

    async fn find_device(&mut self, serial_no: &str) -> Result<Option<Device>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM devices WHERE serial_no = $1 AND NOT deleted ORDER BY id DESC LIMIT 1",
            DEVICE_COLUMNS
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(serial_no)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn list_devices(&mut self) -> Result<Vec<Device>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM devices WHERE NOT deleted ORDER BY id DESC",
            DEVICE_COLUMNS
        );
        sqlx::query_as::<_, Device>(&query)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn insert_device(
        &mut self,
        device: &NewDevice,
        action: &str,
    ) -> Result<Device, DatabaseError> {
        let mut tx = self.conn.begin().await.map_err(DatabaseError::from_query)?;

        let query = format!(
            r#"
            INSERT INTO devices (serial_no, device_name, auth_mode, is_active, deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, false, $5, $6)
            RETURNING {}
            "#,
            DEVICE_COLUMNS
        );
        let stored = sqlx::query_as::<_, Device>(&query)
            .bind(&device.serial_no)
            .bind(&device.device_name)
            .bind(device.auth_mode)
            .bind(device.is_active)
            .bind(device.created_at)
            .bind(device.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_query)?;

        append_log(&mut *tx, &stored.serial_no, action).await?;
        tx.commit().await.map_err(DatabaseError::from_query)?;
        Ok(stored)
    }

    async fn save_device(&mut self, device: &Device, action: &str) -> Result<Device, DatabaseError> {
        let mut tx = self.conn.begin().await.map_err(DatabaseError::from_query)?;

        // Guarded on NOT deleted so a deleted row can never be brought back
        let query = format!(
            r#"
            UPDATE devices
            SET device_name = $2, auth_mode = $3, is_active = $4, deleted = $5, updated_at = $6
            WHERE id = $1 AND NOT deleted
            RETURNING {}
            "#,
            DEVICE_COLUMNS
        );
        let stored = sqlx::query_as::<_, Device>(&query)
            .bind(device.id)
            .bind(&device.device_name)
            .bind(device.auth_mode)
            .bind(device.is_active)
            .bind(device.deleted)
            .bind(device.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_query)?
            .ok_or_else(|| DatabaseError::NotFound(format!("device {}", device.serial_no)))?;

        append_log(&mut *tx, &stored.serial_no, action).await?;
        tx.commit().await.map_err(DatabaseError::from_query)?;
        Ok(stored)
    }

    async fn device_history(&mut self, serial_no: &str) -> Result<Vec<DeviceLog>, DatabaseError> {
        sqlx::query_as::<_, DeviceLog>(
            "SELECT id, serial_no, action, created_at FROM device_logs WHERE serial_no = $1 ORDER BY id DESC",
        )
        .bind(serial_no)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn list_admin_users(&mut self) -> Result<Vec<AdminUser>, DatabaseError> {
        let query = format!("SELECT {} FROM admin_users ORDER BY id", ADMIN_USER_COLUMNS);
        sqlx::query_as::<_, AdminUser>(&query)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn find_admin_user(&mut self, id: i32) -> Result<Option<AdminUser>, DatabaseError> {
        let query = format!("SELECT {} FROM admin_users WHERE id = $1", ADMIN_USER_COLUMNS);
        sqlx::query_as::<_, AdminUser>(&query)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn find_admin_user_by_name(
        &mut self,
        username: &str,
    ) -> Result<Option<AdminUser>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM admin_users WHERE username = $1",
            ADMIN_USER_COLUMNS
        );
        sqlx::query_as::<_, AdminUser>(&query)
            .bind(username)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn insert_admin_user(&mut self, user: &NewAdminUser) -> Result<AdminUser, DatabaseError> {
        let query = format!(
            "INSERT INTO admin_users (username, password_hash, role, created_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            ADMIN_USER_COLUMNS
        );
        sqlx::query_as::<_, AdminUser>(&query)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn save_admin_user(&mut self, user: &AdminUser) -> Result<AdminUser, DatabaseError> {
        let query = format!(
            "UPDATE admin_users SET password_hash = $2, role = $3 WHERE id = $1 RETURNING {}",
            ADMIN_USER_COLUMNS
        );
        sqlx::query_as::<_, AdminUser>(&query)
            .bind(user.id)
            .bind(&user.password_hash)
            .bind(&user.role)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)?
            .ok_or_else(|| DatabaseError::NotFound(format!("admin user {}", user.id)))
    }

    async fn delete_admin_user(&mut self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM admin_users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(result.rows_affected() > 0)
    }
}

async fn append_log(
    conn: &mut sqlx::PgConnection,
    serial_no: &str,
    action: &str,
) -> Result<(), DatabaseError> {
    sqlx::query("INSERT INTO device_logs (serial_no, action, created_at) VALUES ($1, $2, now())")
        .bind(serial_no)
        .bind(action)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_query)?;
    Ok(())
}
