// handlers/public/mod.rs - endpoints outside tenant-resolution middleware

pub mod login;

pub use login::login;
