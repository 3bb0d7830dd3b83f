pub mod admin_user;
pub mod device;
pub mod tenant;

pub use admin_user::{AdminRole, AdminUser, NewAdminUser};
pub use device::{AuthMode, Device, DeviceChanges, DeviceLog, DeviceState, NewDevice};
pub use tenant::Tenant;
