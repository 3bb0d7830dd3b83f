use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{hash_password, needs_rehash, verify_password, PasswordError};
use crate::database::models::{AdminRole, AdminUser, NewAdminUser};
use crate::database::{DatabaseError, TenantStorage};

#[derive(Debug, Error)]
pub enum AdminUserError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Admin user {0} not found")]
    NotFound(i32),
    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("{0}")]
    InvariantViolation(&'static str),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

const ROOT_MUST_BE_SUPER_ADMIN: &str = "The admin account must keep the super_admin role";
const ROOT_UNDELETABLE: &str = "The admin account cannot be deleted";

/// Admin user as shown to the console. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserSummary {
    pub id: i32,
    pub username: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
}

impl From<&AdminUser> for AdminUserSummary {
    fn from(user: &AdminUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAdminUser {
    pub username: String,
    pub password: String,
    pub role: Option<String>,
}

/// Blank or absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAdminUser {
    pub password: Option<String>,
    pub role: Option<String>,
}

pub struct AdminUserService<'a> {
    storage: &'a mut dyn TenantStorage,
}

impl<'a> AdminUserService<'a> {
    pub fn new(storage: &'a mut dyn TenantStorage) -> Self {
        Self { storage }
    }

    pub async fn list(&mut self) -> Result<Vec<AdminUserSummary>, AdminUserError> {
        let users = self.storage.list_admin_users().await?;
        Ok(users.iter().map(AdminUserSummary::from).collect())
    }

    pub async fn create(
        &mut self,
        request: &CreateAdminUser,
    ) -> Result<AdminUserSummary, AdminUserError> {
        let username = request.username.trim();
        if username.is_empty() || request.password.trim().is_empty() {
            return Err(AdminUserError::BadRequest(
                "username and password are required".to_string(),
            ));
        }

        let role = match request.role.as_deref().map(str::trim) {
            None | Some("") => AdminRole::Admin,
            Some(value) => parse_role(value)?,
        };
        if AdminUser::is_root_name(username) && role != AdminRole::SuperAdmin {
            return Err(AdminUserError::InvariantViolation(ROOT_MUST_BE_SUPER_ADMIN));
        }

        if self.storage.find_admin_user_by_name(username).await?.is_some() {
            return Err(AdminUserError::DuplicateUsername(username.to_string()));
        }

        let new_user = NewAdminUser {
            username: username.to_string(),
            password_hash: hash_password(&request.password)?,
            role,
            created_at: Utc::now(),
        };
        match self.storage.insert_admin_user(&new_user).await {
            Ok(user) => Ok(AdminUserSummary::from(&user)),
            Err(DatabaseError::Conflict(_)) => {
                Err(AdminUserError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(
        &mut self,
        id: i32,
        request: &UpdateAdminUser,
    ) -> Result<AdminUserSummary, AdminUserError> {
        let mut user = self
            .storage
            .find_admin_user(id)
            .await?
            .ok_or(AdminUserError::NotFound(id))?;

        if let Some(role) = non_blank(request.role.as_deref()) {
            let role = parse_role(role)?;
            if user.is_root() && role != AdminRole::SuperAdmin {
                return Err(AdminUserError::InvariantViolation(ROOT_MUST_BE_SUPER_ADMIN));
            }
            user.role = role.as_str().to_string();
        }

        if let Some(password) = non_blank(request.password.as_deref()) {
            user.password_hash = hash_password(password)?;
        }
        if user.is_root() {
            user.role = AdminRole::SuperAdmin.as_str().to_string();
        }

        let saved = self.storage.save_admin_user(&user).await.map_err(|e| match e {
            DatabaseError::NotFound(_) => AdminUserError::NotFound(id),
            other => other.into(),
        })?;
        Ok(AdminUserSummary::from(&saved))
    }

    pub async fn delete(&mut self, id: i32) -> Result<(), AdminUserError> {
        let user = self
            .storage
            .find_admin_user(id)
            .await?
            .ok_or(AdminUserError::NotFound(id))?;
        if user.is_root() {
            return Err(AdminUserError::InvariantViolation(ROOT_UNDELETABLE));
        }

        if self.storage.delete_admin_user(id).await? {
            Ok(())
        } else {
            Err(AdminUserError::NotFound(id))
        }
    }

    /// Verifies credentials; a legacy stored hash is upgraded to the current scheme on success.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<AdminUserSummary, AdminUserError> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(AdminUserError::BadRequest(
                "username and password are required".to_string(),
            ));
        }

        let Some(mut user) = self.storage.find_admin_user_by_name(username).await? else {
            warn!("Login failed for unknown user {} in {}", username, self.storage.locator());
            return Err(AdminUserError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            warn!("Login failed for {} in {}", username, self.storage.locator());
            return Err(AdminUserError::InvalidCredentials);
        }

        if needs_rehash(&user.password_hash) {
            self.migrate_password(&mut user, password).await;
        }

        Ok(AdminUserSummary::from(&user))
    }

    async fn migrate_password(&mut self, user: &mut AdminUser, password: &str) {
        let hash = match hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Could not rehash password for {}: {}", user.username, e);
                return;
            }
        };
        let previous = std::mem::replace(&mut user.password_hash, hash);
        if user.is_root() {
            user.role = AdminRole::SuperAdmin.as_str().to_string();
        }
        match self.storage.save_admin_user(user).await {
            Ok(_) => info!("Migrated password hash for {} to argon2", user.username),
            Err(e) => {
                warn!("Could not store migrated password for {}: {}", user.username, e);
                user.password_hash = previous;
            }
        }
    }
}

fn parse_role(value: &str) -> Result<AdminRole, AdminUserError> {
    AdminRole::parse(value).ok_or_else(|| {
        AdminUserError::BadRequest(format!(
            "role must be 'admin' or 'super_admin', got '{}'",
            value
        ))
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
