pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod storage;

pub use manager::{DatabaseError, DatabaseManager, StorageLocator};
pub use memory::MemoryBackend;
pub use postgres::{PgStorageRouter, PgTenantDirectory};
pub use storage::{StorageRouter, TenantDirectory, TenantStorage};
