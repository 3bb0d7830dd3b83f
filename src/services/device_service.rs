use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::models::{AuthMode, Device, DeviceChanges, DeviceLog, NewDevice};
use crate::database::{DatabaseError, TenantStorage};

pub const ACTION_AUTO_REGISTERED: &str = "auto-registered";
pub const ACTION_CREATED: &str = "created";
pub const ACTION_SOFT_DELETED: &str = "soft-deleted";

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("serialNo is required")]
    MissingSerial,
    #[error("Device with serialNo '{0}' not found")]
    NotFound(String),
    #[error("Device with serialNo '{0}' already exists")]
    DuplicateSerial(String),
    #[error("Device with serialNo '{0}' is disabled")]
    Disabled(String),
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// What a camera learns about itself when it asks for its auth mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthModeView {
    pub auth_mode: AuthMode,
    pub device_name: String,
    pub is_active: bool,
}

impl From<&Device> for AuthModeView {
    fn from(device: &Device) -> Self {
        Self {
            auth_mode: device.auth_mode,
            device_name: device.device_name.clone(),
            is_active: device.is_active,
        }
    }
}

/// Console request to register a device up front. Timestamps are always set server-side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDevice {
    pub serial_no: String,
    pub device_name: String,
    pub auth_mode: AuthMode,
    pub is_active: bool,
}

/// Device lifecycle over a single tenant's storage handle.
pub struct DeviceService<'a> {
    storage: &'a mut dyn TenantStorage,
}

impl<'a> DeviceService<'a> {
    pub fn new(storage: &'a mut dyn TenantStorage) -> Self {
        Self { storage }
    }

    /// Looks up a live device and registers it with defaults if it has never been seen.
    /// A disabled device yields `Disabled` and none of its data.
    pub async fn get_or_register(&mut self, serial_no: &str) -> Result<AuthModeView, DeviceError> {
        let serial_no = require_serial(serial_no)?;

        let device = match self.storage.find_device(serial_no).await? {
            Some(device) => device,
            None => self.register(serial_no).await?,
        };

        if !device.is_active {
            warn!("Disabled device {} asked for its auth mode", serial_no);
            return Err(DeviceError::Disabled(serial_no.to_string()));
        }

        Ok(AuthModeView::from(&device))
    }

    async fn register(&mut self, serial_no: &str) -> Result<Device, DeviceError> {
        let new_device = NewDevice::auto_registered(serial_no, Utc::now());
        match self
            .storage
            .insert_device(&new_device, ACTION_AUTO_REGISTERED)
            .await
        {
            Ok(device) => {
                info!("Auto-registered device {} in {}", serial_no, self.storage.locator());
                Ok(device)
            }
            // Another request registered it first; read theirs
            Err(DatabaseError::Conflict(_)) => {
                debug!("Lost registration race for {}, retrying as lookup", serial_no);
                self.storage
                    .find_device(serial_no)
                    .await?
                    .ok_or_else(|| DeviceError::NotFound(serial_no.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Device-initiated update. Never creates a device.
    pub async fn self_update(
        &mut self,
        serial_no: &str,
        changes: &DeviceChanges,
    ) -> Result<Device, DeviceError> {
        let serial_no = require_serial(serial_no)?;
        let action = format!("self-updated: {}", describe(changes));
        self.update_live(serial_no, changes, &action).await
    }

    pub async fn admin_create(&mut self, request: &CreateDevice) -> Result<Device, DeviceError> {
        let serial_no = require_serial(&request.serial_no)?;

        if self.storage.find_device(serial_no).await?.is_some() {
            return Err(DeviceError::DuplicateSerial(serial_no.to_string()));
        }

        let now = Utc::now();
        let device_name = match request.device_name.trim() {
            "" => NewDevice::DEFAULT_NAME.to_string(),
            name => name.to_string(),
        };
        let new_device = NewDevice {
            serial_no: serial_no.to_string(),
            device_name,
            auth_mode: request.auth_mode,
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
        };

        match self.storage.insert_device(&new_device, ACTION_CREATED).await {
            Ok(device) => Ok(device),
            Err(DatabaseError::Conflict(_)) => Err(DeviceError::DuplicateSerial(serial_no.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn admin_update(
        &mut self,
        serial_no: &str,
        changes: &DeviceChanges,
    ) -> Result<Device, DeviceError> {
        let serial_no = require_serial(serial_no)?;
        let action = format!("updated: {}", describe(changes));
        self.update_live(serial_no, changes, &action).await
    }

    /// Sets `deleted` and clears `is_active` in one write. The row is kept for its history.
    pub async fn soft_delete(&mut self, serial_no: &str) -> Result<Device, DeviceError> {
        let serial_no = require_serial(serial_no)?;
        let mut device = self.find_live(serial_no).await?;
        device.mark_deleted(Utc::now());
        self.save(device, ACTION_SOFT_DELETED).await
    }

    pub async fn list(&mut self) -> Result<Vec<Device>, DeviceError> {
        Ok(self.storage.list_devices().await?)
    }

    pub async fn history(&mut self, serial_no: &str) -> Result<Vec<DeviceLog>, DeviceError> {
        let serial_no = require_serial(serial_no)?;
        Ok(self.storage.device_history(serial_no).await?)
    }

    async fn update_live(
        &mut self,
        serial_no: &str,
        changes: &DeviceChanges,
        action: &str,
    ) -> Result<Device, DeviceError> {
        let mut device = self.find_live(serial_no).await?;
        device.apply(changes, Utc::now());
        self.save(device, action).await
    }

    async fn find_live(&mut self, serial_no: &str) -> Result<Device, DeviceError> {
        self.storage
            .find_device(serial_no)
            .await?
            .ok_or_else(|| DeviceError::NotFound(serial_no.to_string()))
    }

    async fn save(&mut self, device: Device, action: &str) -> Result<Device, DeviceError> {
        match self.storage.save_device(&device, action).await {
            Ok(saved) => Ok(saved),
            // Deleted between our read and write
            Err(DatabaseError::NotFound(_)) => Err(DeviceError::NotFound(device.serial_no)),
            Err(e) => Err(e.into()),
        }
    }
}

fn require_serial(serial_no: &str) -> Result<&str, DeviceError> {
    match serial_no.trim() {
        "" => Err(DeviceError::MissingSerial),
        serial => Ok(serial),
    }
}

fn describe(changes: &DeviceChanges) -> String {
    format!(
        "name={}, authMode={}, isActive={}",
        changes.device_name,
        changes.auth_mode.label(),
        changes.is_active
    )
}
