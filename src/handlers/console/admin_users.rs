use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use serde::Serialize;

use crate::middleware::{ApiResponse, ApiResult, TenantStore};
use crate::services::admin_user_service::{CreateAdminUser, UpdateAdminUser};
use crate::services::{AdminUserService, AdminUserSummary};

#[derive(Debug, Serialize)]
pub struct DeletedAdminUser {
    pub id: i32,
    pub deleted: bool,
}

/// GET /api/adminusers
pub async fn list(mut store: TenantStore) -> ApiResult<Vec<AdminUserSummary>> {
    let users = AdminUserService::new(store.storage()).list().await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/adminusers
pub async fn create(
    mut store: TenantStore,
    payload: Result<Json<CreateAdminUser>, JsonRejection>,
) -> ApiResult<AdminUserSummary> {
    let Json(request) = payload?;
    let user = AdminUserService::new(store.storage()).create(&request).await?;
    Ok(ApiResponse::created(user))
}

/// PUT /api/adminusers/:id
pub async fn update(
    mut store: TenantStore,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateAdminUser>, JsonRejection>,
) -> ApiResult<AdminUserSummary> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let user = AdminUserService::new(store.storage()).update(id, &request).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/adminusers/:id
pub async fn delete(
    mut store: TenantStore,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<DeletedAdminUser> {
    let Path(id) = path?;
    AdminUserService::new(store.storage()).delete(id).await?;
    Ok(ApiResponse::success(DeletedAdminUser { id, deleted: true }))
}
