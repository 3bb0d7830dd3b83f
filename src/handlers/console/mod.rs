// handlers/console/mod.rs - management console endpoints
//
// Route Prefix: /api/devices, /api/adminusers
// Middleware: tenant resolution

pub mod admin_users;
pub mod devices;
