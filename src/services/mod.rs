pub mod admin_user_service;
pub mod device_service;

pub use admin_user_service::{AdminUserError, AdminUserService, AdminUserSummary};
pub use device_service::{AuthModeView, DeviceError, DeviceService};
