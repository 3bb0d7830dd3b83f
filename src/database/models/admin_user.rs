use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Admin,
    SuperAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super_admin",
        }
    }

    /// Strict parse for input; `None` for anything but the two known roles.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(AdminRole::Admin),
            "super_admin" => Some(AdminRole::SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub const ROOT_USERNAME: &'static str = "admin";

    pub fn is_root_name(username: &str) -> bool {
        username.trim().eq_ignore_ascii_case(Self::ROOT_USERNAME)
    }

    pub fn is_root(&self) -> bool {
        Self::is_root_name(&self.username)
    }

    /// Effective role. The root account is always `super_admin` whatever the row says; otherwise
    /// blank or unrecognized values read as plain `admin`.
    pub fn role(&self) -> AdminRole {
        if self.is_root() {
            return AdminRole::SuperAdmin;
        }
        AdminRole::parse(&self.role).unwrap_or(AdminRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAdminUser {
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
}
