use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::database::manager::{DatabaseError, StorageLocator};
use crate::database::models::{
    AdminRole, AdminUser, Device, DeviceLog, NewAdminUser, NewDevice, Tenant,
};
use crate::database::storage::{StorageRouter, TenantDirectory, TenantStorage};

#[derive(Default)]
struct Namespace {
    devices: Vec<Device>,
    logs: Vec<DeviceLog>,
    admin_users: Vec<AdminUser>,
    next_device_id: i32,
    next_log_id: i64,
    next_user_id: i32,
}

impl Namespace {
    fn append_log(&mut self, serial_no: &str, action: &str) {
        self.next_log_id += 1;
        self.logs.push(DeviceLog {
            id: self.next_log_id,
            serial_no: serial_no.to_string(),
            action: action.to_string(),
            created_at: Utc::now(),
        });
    }

    fn insert_admin_user(&mut self, user: &NewAdminUser) -> Result<AdminUser, DatabaseError> {
        if self.admin_users.iter().any(|u| u.username == user.username) {
            return Err(DatabaseError::Conflict(format!(
                "admin user {} already exists",
                user.username
            )));
        }
        self.next_user_id += 1;
        let stored = AdminUser {
            id: self.next_user_id,
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        };
        self.admin_users.push(stored.clone());
        Ok(stored)
    }
}

/// In-process tenant directory and storage with one isolated namespace per tenant code
pub struct MemoryBackend {
    directory_database: String,
    tenants: RwLock<Vec<Tenant>>,
    namespaces: Mutex<HashMap<StorageLocator, Arc<Mutex<Namespace>>>>,
    unavailable: RwLock<HashSet<String>>,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("tenant_directory")
    }
}

impl MemoryBackend {
    pub fn new(directory_database: impl Into<String>) -> Self {
        Self {
            directory_database: directory_database.into(),
            tenants: RwLock::new(Vec::new()),
            namespaces: Mutex::new(HashMap::new()),
            unavailable: RwLock::new(HashSet::new()),
            opened: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Registers a live tenant in the directory.
    pub async fn add_tenant(&self, tenant_code: &str, tenant_name: &str) -> Tenant {
        let now = Utc::now();
        let mut tenants = self.tenants.write().await;
        let tenant = Tenant {
            id: tenants.len() as i32 + 1,
            tenant_code: tenant_code.to_string(),
            tenant_name: tenant_name.to_string(),
            del_flg: 0,
            created_at: now,
            updated_at: now,
        };
        tenants.push(tenant.clone());
        tenant
    }

    /// Marks a tenant retired; it stays in the directory but no longer resolves.
    pub async fn retire_tenant(&self, tenant_code: &str) {
        let mut tenants = self.tenants.write().await;
        for tenant in tenants.iter_mut().filter(|t| t.tenant_code == tenant_code) {
            tenant.del_flg = 1;
            tenant.updated_at = Utc::now();
        }
    }

    /// Seeds an admin user directly into a tenant namespace, bypassing lifecycle rules.
    pub async fn seed_admin_user(
        &self,
        tenant_code: &str,
        username: &str,
        password_hash: &str,
        role: AdminRole,
    ) -> Result<AdminUser, DatabaseError> {
        let namespace = self.namespace(tenant_code).await?;
        let mut ns = namespace.lock().await;
        ns.insert_admin_user(&NewAdminUser {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        })
    }

    /// Simulates the tenant's storage being unreachable.
    pub async fn set_unavailable(&self, tenant_code: &str, unavailable: bool) {
        let mut set = self.unavailable.write().await;
        if unavailable {
            set.insert(tenant_code.to_string());
        } else {
            set.remove(tenant_code);
        }
    }

    /// Number of storage handles opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of storage handles dropped so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Every device row of a tenant, deleted ones included.
    pub async fn device_rows(&self, tenant_code: &str) -> Result<Vec<Device>, DatabaseError> {
        let namespace = self.namespace(tenant_code).await?;
        let ns = namespace.lock().await;
        Ok(ns.devices.clone())
    }

    /// Every audit entry of a tenant, oldest first.
    pub async fn log_rows(&self, tenant_code: &str) -> Result<Vec<DeviceLog>, DatabaseError> {
        let namespace = self.namespace(tenant_code).await?;
        let ns = namespace.lock().await;
        Ok(ns.logs.clone())
    }

    async fn namespace(&self, tenant_code: &str) -> Result<Arc<Mutex<Namespace>>, DatabaseError> {
        let tenant = {
            let tenants = self.tenants.read().await;
            tenants
                .iter()
                .find(|t| t.tenant_code == tenant_code)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound(format!("tenant {}", tenant_code)))?
        };
        let locator = StorageLocator::for_tenant(&tenant, &self.directory_database)?;
        let mut namespaces = self.namespaces.lock().await;
        Ok(namespaces.entry(locator).or_default().clone())
    }
}

#[async_trait]
impl TenantDirectory for MemoryBackend {
    async fn find_active(&self, tenant_code: &str) -> Result<Option<Tenant>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .iter()
            .find(|t| t.tenant_code == tenant_code && t.is_active())
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, DatabaseError> {
        let tenants = self.tenants.read().await;
        let mut active: Vec<Tenant> = tenants.iter().filter(|t| t.is_active()).cloned().collect();
        active.sort_by(|a, b| a.tenant_code.cmp(&b.tenant_code));
        Ok(active)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[async_trait]
impl StorageRouter for MemoryBackend {
    async fn open(&self, tenant: &Tenant) -> Result<Box<dyn TenantStorage>, DatabaseError> {
        if self.unavailable.read().await.contains(&tenant.tenant_code) {
            return Err(DatabaseError::Unavailable(format!(
                "tenant store {} is unreachable",
                tenant.tenant_code
            )));
        }
        let locator = StorageLocator::for_tenant(tenant, &self.directory_database)?;
        let namespace = {
            let mut namespaces = self.namespaces.lock().await;
            namespaces.entry(locator.clone()).or_default().clone()
        };
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory storage handle for: {}", locator);
        Ok(Box::new(MemoryTenantStorage {
            locator,
            namespace,
            released: self.released.clone(),
        }))
    }
}

/// Handle onto exactly one namespace; it holds no reference to any other tenant.
pub struct MemoryTenantStorage {
    locator: StorageLocator,
    namespace: Arc<Mutex<Namespace>>,
    released: Arc<AtomicUsize>,
}

impl Drop for MemoryTenantStorage {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        debug!("Released in-memory storage handle for: {}", self.locator);
    }
}

#[async_trait]
impl TenantStorage for MemoryTenantStorage {
    fn locator(&self) -> &StorageLocator {
        &self.locator
    }

    async fn find_device(&mut self, serial_no: &str) -> Result<Option<Device>, DatabaseError> {
        let ns = self.namespace.lock().await;
        Ok(ns
            .devices
            .iter()
            .rev()
            .find(|d| d.serial_no == serial_no && !d.deleted)
            .cloned())
    }

    async fn list_devices(&mut self) -> Result<Vec<Device>, DatabaseError> {
        let ns = self.namespace.lock().await;
        let mut devices: Vec<Device> = ns.devices.iter().filter(|d| !d.deleted).cloned().collect();
        devices.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(devices)
    }

    async fn insert_device(
        &mut self,
        device: &NewDevice,
        action: &str,
    ) -> Result<Device, DatabaseError> {
        let mut ns = self.namespace.lock().await;
        if ns
            .devices
            .iter()
            .any(|d| d.serial_no == device.serial_no && !d.deleted)
        {
            return Err(DatabaseError::Conflict(format!(
                "device {} already exists",
                device.serial_no
            )));
        }
        ns.next_device_id += 1;
        let stored = Device {
            id: ns.next_device_id,
            serial_no: device.serial_no.clone(),
            device_name: device.device_name.clone(),
            auth_mode: device.auth_mode,
            is_active: device.is_active,
            deleted: false,
            created_at: device.created_at,
            updated_at: device.updated_at,
        };
        ns.devices.push(stored.clone());
        ns.append_log(&stored.serial_no, action);
        Ok(stored)
    }

    async fn save_device(&mut self, device: &Device, action: &str) -> Result<Device, DatabaseError> {
        let mut ns = self.namespace.lock().await;
        let row = ns
            .devices
            .iter_mut()
            .find(|d| d.id == device.id && !d.deleted)
            .ok_or_else(|| DatabaseError::NotFound(format!("device {}", device.serial_no)))?;
        row.device_name = device.device_name.clone();
        row.auth_mode = device.auth_mode;
        row.is_active = device.is_active;
        row.deleted = device.deleted;
        row.updated_at = device.updated_at;
        let stored = row.clone();
        ns.append_log(&stored.serial_no, action);
        Ok(stored)
    }

    async fn device_history(&mut self, serial_no: &str) -> Result<Vec<DeviceLog>, DatabaseError> {
        let ns = self.namespace.lock().await;
        Ok(ns
            .logs
            .iter()
            .rev()
            .filter(|l| l.serial_no == serial_no)
            .cloned()
            .collect())
    }

    async fn list_admin_users(&mut self) -> Result<Vec<AdminUser>, DatabaseError> {
        let ns = self.namespace.lock().await;
        let mut users = ns.admin_users.clone();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn find_admin_user(&mut self, id: i32) -> Result<Option<AdminUser>, DatabaseError> {
        let ns = self.namespace.lock().await;
        Ok(ns.admin_users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_admin_user_by_name(
        &mut self,
        username: &str,
    ) -> Result<Option<AdminUser>, DatabaseError> {
        let ns = self.namespace.lock().await;
        Ok(ns.admin_users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert_admin_user(&mut self, user: &NewAdminUser) -> Result<AdminUser, DatabaseError> {
        let mut ns = self.namespace.lock().await;
        ns.insert_admin_user(user)
    }

    async fn save_admin_user(&mut self, user: &AdminUser) -> Result<AdminUser, DatabaseError> {
        let mut ns = self.namespace.lock().await;
        let row = ns
            .admin_users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("admin user {}", user.id)))?;
        row.password_hash = user.password_hash.clone();
        row.role = user.role.clone();
        Ok(row.clone())
    }

    async fn delete_admin_user(&mut self, id: i32) -> Result<bool, DatabaseError> {
        let mut ns = self.namespace.lock().await;
        let before = ns.admin_users.len();
        ns.admin_users.retain(|u| u.id != id);
        Ok(ns.admin_users.len() < before)
    }
}
