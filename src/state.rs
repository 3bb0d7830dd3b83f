use std::sync::Arc;

use crate::config::{SecurityConfig, TenancyConfig};
use crate::database::{StorageRouter, TenantDirectory};
use crate::tenancy::TenantResolver;

/// Shared across requests. Holds no tenant-specific handle.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<TenantResolver>,
    pub router: Arc<dyn StorageRouter>,
    pub directory: Arc<dyn TenantDirectory>,
    pub tenancy: TenancyConfig,
    pub security: SecurityConfig,
}

impl AppState {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        router: Arc<dyn StorageRouter>,
        tenancy: TenancyConfig,
        security: SecurityConfig,
    ) -> Self {
        let resolver = TenantResolver::from_config(&tenancy, &security.jwt_secret, directory.clone());
        Self {
            resolver: Arc::new(resolver),
            router,
            directory,
            tenancy,
            security,
        }
    }
}
