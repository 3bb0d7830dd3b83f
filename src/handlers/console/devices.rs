use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use serde::Serialize;

use crate::database::models::{Device, DeviceChanges, DeviceLog};
use crate::middleware::{ApiResponse, ApiResult, TenantStore};
use crate::services::device_service::CreateDevice;
use crate::services::DeviceService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedDevice {
    pub serial_no: String,
    pub deleted: bool,
}

/// GET /api/devices
pub async fn list(mut store: TenantStore) -> ApiResult<Vec<Device>> {
    let devices = DeviceService::new(store.storage()).list().await?;
    Ok(ApiResponse::success(devices))
}

/// POST /api/devices
pub async fn create(
    mut store: TenantStore,
    payload: Result<Json<CreateDevice>, JsonRejection>,
) -> ApiResult<Device> {
    let Json(request) = payload?;
    let device = DeviceService::new(store.storage()).admin_create(&request).await?;
    Ok(ApiResponse::created(device))
}

/// PUT /api/devices/:serial_no
pub async fn update(
    mut store: TenantStore,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<DeviceChanges>, JsonRejection>,
) -> ApiResult<Device> {
    let Path(serial_no) = path?;
    let Json(changes) = payload?;
    let device = DeviceService::new(store.storage())
        .admin_update(&serial_no, &changes)
        .await?;
    Ok(ApiResponse::success(device))
}

/// DELETE /api/devices/:serial_no
pub async fn delete(
    mut store: TenantStore,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<DeletedDevice> {
    let Path(serial_no) = path?;
    let device = DeviceService::new(store.storage()).soft_delete(&serial_no).await?;
    Ok(ApiResponse::success(DeletedDevice {
        serial_no: device.serial_no,
        deleted: device.deleted,
    }))
}

/// GET /api/devices/:serial_no/history
pub async fn history(
    mut store: TenantStore,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Vec<DeviceLog>> {
    let Path(serial_no) = path?;
    let entries = DeviceService::new(store.storage()).history(&serial_no).await?;
    Ok(ApiResponse::success(entries))
}
