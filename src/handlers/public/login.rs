// handlers/public/login.rs - POST /api/auth/login
//
// Resolves its own tenant: an explicit tenantCode in the body wins, otherwise the usual
// request sources are consulted.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{generate_jwt, Claims};
use crate::config::TenancyConfig;
use crate::database::models::AdminRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AdminUserService;
use crate::state::AppState;
use crate::tenancy::TenantSource;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub tenant_code: Option<String>,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub tenant_code: String,
    pub username: String,
    pub role: AdminRole,
    pub token: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;

    let explicit = request
        .tenant_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());
    let resolved = match explicit {
        Some(code) => state.resolver.confirm(code, TenantSource::LoginBody).await?,
        None => state.resolver.resolve(&headers, &uri).await?,
    };

    let user = {
        let mut storage = state.router.open(&resolved.tenant).await?;
        AdminUserService::new(storage.as_mut())
            .login(&request.username, &request.password)
            .await?
    };

    let claims = Claims::new(
        resolved.code().to_string(),
        user.username.clone(),
        user.role.as_str().to_string(),
        state.security.jwt_expiry_hours,
    );
    let token = generate_jwt(&claims, &state.security.jwt_secret).map_err(|e| {
        tracing::error!("Failed to issue token for {}: {}", user.username, e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    tracing::info!("Admin {} logged in to tenant {}", user.username, resolved.code());

    let cookie = tenant_cookie(&state.tenancy, resolved.code());
    Ok(ApiResponse::success(LoginResponse {
        tenant_code: resolved.code().to_string(),
        username: user.username,
        role: user.role,
        token,
        expires_in: claims.expires_in(),
    })
    .with_cookie(cookie))
}

/// Cookie that later console requests fall back on for tenant resolution.
pub fn tenant_cookie(tenancy: &TenancyConfig, tenant_code: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        tenancy.cookie_name,
        tenant_code,
        tenancy.cookie_max_age_days * 24 * 60 * 60
    )
}
