// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::database::DatabaseError;
use crate::services::admin_user_service::AdminUserError;
use crate::services::device_service::DeviceError;
use crate::tenancy::ResolveError;

/// HTTP API error with a status code and a stable machine-readable code
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    MissingTenantIdentifier(String),

    // 401 Unauthorized
    InvalidToken(String),
    InvalidCredentials(String),

    // 403 Forbidden
    DeviceDisabled(String),
    AccountInvariantViolation(String),

    // 404 Not Found
    UnknownTenant(String),
    DeviceNotFound(String),
    UserNotFound(String),

    // 409 Conflict
    DuplicateSerial(String),
    DuplicateUsername(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    StorageUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) | ApiError::MissingTenantIdentifier(_) => 400,
            ApiError::InvalidToken(_) | ApiError::InvalidCredentials(_) => 401,
            ApiError::DeviceDisabled(_) | ApiError::AccountInvariantViolation(_) => 403,
            ApiError::UnknownTenant(_) | ApiError::DeviceNotFound(_) | ApiError::UserNotFound(_) => 404,
            ApiError::DuplicateSerial(_) | ApiError::DuplicateUsername(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::StorageUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::MissingTenantIdentifier(msg)
            | ApiError::InvalidToken(msg)
            | ApiError::InvalidCredentials(msg)
            | ApiError::DeviceDisabled(msg)
            | ApiError::AccountInvariantViolation(msg)
            | ApiError::UnknownTenant(msg)
            | ApiError::DeviceNotFound(msg)
            | ApiError::UserNotFound(msg)
            | ApiError::DuplicateSerial(msg)
            | ApiError::DuplicateUsername(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::StorageUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::MissingTenantIdentifier(_) => "MISSING_TENANT_IDENTIFIER",
            ApiError::InvalidToken(_) => "INVALID_TOKEN",
            ApiError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            ApiError::DeviceDisabled(_) => "DEVICE_DISABLED",
            ApiError::AccountInvariantViolation(_) => "ACCOUNT_INVARIANT_VIOLATION",
            ApiError::UnknownTenant(_) => "UNKNOWN_TENANT",
            ApiError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            ApiError::UserNotFound(_) => "USER_NOT_FOUND",
            ApiError::DuplicateSerial(_) => "DUPLICATE_SERIAL",
            ApiError::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        ApiError::StorageUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Unavailable(msg) => {
                tracing::error!("Storage unavailable: {}", msg);
                ApiError::storage_unavailable("Tenant storage is temporarily unavailable")
            }
            DatabaseError::ConfigMissing(_)
            | DatabaseError::InvalidDatabaseUrl
            | DatabaseError::InvalidTenantName(_) => {
                tracing::error!("Storage misconfigured: {}", err);
                ApiError::storage_unavailable("Tenant storage is not reachable")
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Storage error: {}", other);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingTenantIdentifier => ApiError::MissingTenantIdentifier(err.to_string()),
            ResolveError::UnknownTenant(_) => ApiError::UnknownTenant(err.to_string()),
            ResolveError::InvalidToken(_) => ApiError::InvalidToken(err.to_string()),
            ResolveError::Directory(db) => db.into(),
        }
    }
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::MissingSerial => ApiError::bad_request(err.to_string()),
            DeviceError::NotFound(_) => ApiError::DeviceNotFound(err.to_string()),
            DeviceError::DuplicateSerial(_) => ApiError::DuplicateSerial(err.to_string()),
            DeviceError::Disabled(_) => ApiError::DeviceDisabled(err.to_string()),
            DeviceError::Storage(db) => db.into(),
        }
    }
}

impl From<AdminUserError> for ApiError {
    fn from(err: AdminUserError) -> Self {
        match err {
            AdminUserError::BadRequest(_) => ApiError::bad_request(err.to_string()),
            AdminUserError::NotFound(_) => ApiError::UserNotFound(err.to_string()),
            AdminUserError::DuplicateUsername(_) => ApiError::DuplicateUsername(err.to_string()),
            AdminUserError::InvariantViolation(_) => {
                ApiError::AccountInvariantViolation(err.to_string())
            }
            AdminUserError::InvalidCredentials => ApiError::InvalidCredentials(err.to_string()),
            AdminUserError::Password(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal_server_error("Failed to process password")
            }
            AdminUserError::Storage(db) => db.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
