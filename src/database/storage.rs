use async_trait::async_trait;

use crate::database::manager::{DatabaseError, StorageLocator};
use crate::database::models::{AdminUser, Device, DeviceLog, NewAdminUser, NewDevice, Tenant};

/// Shared registry of tenants. Read-only to request handling.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Live (non-retired) tenant with exactly this code.
    async fn find_active(&self, tenant_code: &str) -> Result<Option<Tenant>, DatabaseError>;

    async fn list_active(&self) -> Result<Vec<Tenant>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Opens request-scoped handles onto one tenant's isolated storage.
#[async_trait]
pub trait StorageRouter: Send + Sync {
    async fn open(&self, tenant: &Tenant) -> Result<Box<dyn TenantStorage>, DatabaseError>;
}

/// One tenant's devices, audit log and admin users, valid for a single request.
///
/// Device lookups never return soft-deleted rows. Every device write is persisted together with
/// its audit entry, so either both land or neither does. Dropping the handle releases it.
#[async_trait]
pub trait TenantStorage: Send {
    fn locator(&self) -> &StorageLocator;

    async fn find_device(&mut self, serial_no: &str) -> Result<Option<Device>, DatabaseError>;

    /// Non-deleted devices, newest id first.
    async fn list_devices(&mut self) -> Result<Vec<Device>, DatabaseError>;

    /// Fails with `Conflict` when a non-deleted device already holds the serial.
    async fn insert_device(
        &mut self,
        device: &NewDevice,
        action: &str,
    ) -> Result<Device, DatabaseError>;

    /// Writes the mutable fields and both flags of a live row. A row that is already deleted
    /// (or gone) yields `NotFound`.
    async fn save_device(&mut self, device: &Device, action: &str) -> Result<Device, DatabaseError>;

    /// Audit entries for a serial, newest first, whether or not the device still exists.
    async fn device_history(&mut self, serial_no: &str) -> Result<Vec<DeviceLog>, DatabaseError>;

    /// All admin users, oldest id first.
    async fn list_admin_users(&mut self) -> Result<Vec<AdminUser>, DatabaseError>;

    async fn find_admin_user(&mut self, id: i32) -> Result<Option<AdminUser>, DatabaseError>;

    async fn find_admin_user_by_name(
        &mut self,
        username: &str,
    ) -> Result<Option<AdminUser>, DatabaseError>;

    /// Fails with `Conflict` when the username is taken.
    async fn insert_admin_user(&mut self, user: &NewAdminUser) -> Result<AdminUser, DatabaseError>;

    async fn save_admin_user(&mut self, user: &AdminUser) -> Result<AdminUser, DatabaseError>;

    /// Returns whether a row was removed.
    async fn delete_admin_user(&mut self, id: i32) -> Result<bool, DatabaseError>;
}
