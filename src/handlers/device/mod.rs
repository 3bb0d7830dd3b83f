// handlers/device/mod.rs - endpoints called by the cameras themselves
//
// Route Prefix: /api/device
// Middleware: tenant resolution

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;

use crate::database::models::{AuthMode, Device, DeviceChanges};
use crate::middleware::{ApiResponse, ApiResult, TenantStore};
use crate::services::{AuthModeView, DeviceService};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialRequest {
    pub serial_no: String,
}

/// Fields a camera omits fall back to zero values, as older firmware sends partial bodies.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelfUpdateRequest {
    pub serial_no: String,
    pub auth_mode: AuthMode,
    pub device_name: String,
    pub is_active: bool,
}

/// POST /api/device/getAuthMode
///
/// Registers an unseen serial on first contact. Disabled devices get `DEVICE_DISABLED`.
pub async fn get_auth_mode(
    mut store: TenantStore,
    payload: Result<Json<SerialRequest>, JsonRejection>,
) -> ApiResult<AuthModeView> {
    let Json(request) = payload?;
    let view = DeviceService::new(store.storage())
        .get_or_register(&request.serial_no)
        .await?;
    Ok(ApiResponse::success(view))
}

/// POST /api/device/update
pub async fn self_update(
    mut store: TenantStore,
    payload: Result<Json<SelfUpdateRequest>, JsonRejection>,
) -> ApiResult<Device> {
    let Json(request) = payload?;
    let changes = DeviceChanges {
        device_name: request.device_name,
        auth_mode: request.auth_mode,
        is_active: request.is_active,
    };
    let device = DeviceService::new(store.storage())
        .self_update(&request.serial_no, &changes)
        .await?;
    Ok(ApiResponse::success(device))
}
