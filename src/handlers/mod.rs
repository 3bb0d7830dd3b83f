// handlers/mod.rs
//
// public  - no tenant middleware; resolves its own tenant (login)
// device  - camera-facing endpoints
// console - management console endpoints

pub mod console;
pub mod device;
pub mod public;
