use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Biometric verification method. Only 0, 1 and 2 carry meaning, but any value round-trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AuthMode(pub i32);

impl AuthMode {
    pub const FACE: AuthMode = AuthMode(0);
    pub const VEIN: AuthMode = AuthMode(1);
    pub const FACE_AND_VEIN: AuthMode = AuthMode(2);

    pub fn label(&self) -> String {
        match self.0 {
            0 => "face".to_string(),
            1 => "vein".to_string(),
            2 => "face+vein".to_string(),
            other => format!("unknown ({})", other),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Lifecycle position derived from the two flags on a device row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    Active,
    Disabled,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i32,
    pub serial_no: String,
    pub device_name: String,
    pub auth_mode: AuthMode,
    pub is_active: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn state(&self) -> DeviceState {
        match (self.deleted, self.is_active) {
            (true, _) => DeviceState::Deleted,
            (false, true) => DeviceState::Active,
            (false, false) => DeviceState::Disabled,
        }
    }

    /// Overwrites the three mutable fields. Has no effect on a deleted row.
    pub fn apply(&mut self, changes: &DeviceChanges, now: DateTime<Utc>) {
        if self.deleted {
            return;
        }
        self.device_name = changes.device_name.clone();
        self.auth_mode = changes.auth_mode;
        self.is_active = changes.is_active;
        self.updated_at = now;
    }

    /// Both flags move together: a deleted device is never active.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.is_active = false;
        self.updated_at = now;
    }
}

/// Row to insert; ids and audit entries are assigned by storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDevice {
    pub serial_no: String,
    pub device_name: String,
    pub auth_mode: AuthMode,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewDevice {
    pub const DEFAULT_NAME: &'static str = "Unknown";

    /// Defaults used when an unseen camera first asks for its auth mode.
    pub fn auto_registered(serial_no: &str, now: DateTime<Utc>) -> Self {
        Self {
            serial_no: serial_no.to_string(),
            device_name: Self::DEFAULT_NAME.to_string(),
            auth_mode: AuthMode::FACE,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceChanges {
    pub device_name: String,
    pub auth_mode: AuthMode,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLog {
    pub id: i64,
    pub serial_no: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}
