use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::database::TenantStorage;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::ResolvedTenant;

/// Resolves the tenant before any handler runs and stores it in the request extensions.
/// Nothing downstream can open storage without it.
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let resolved = state
        .resolver
        .resolve(request.headers(), request.uri())
        .await?;
    request.extensions_mut().insert(resolved);
    Ok(next.run(request).await)
}

/// The resolved tenant plus a storage handle opened for this request only.
/// The handle is released when the extractor is dropped at the end of the handler.
pub struct TenantStore {
    pub tenant: ResolvedTenant,
    pub storage: Box<dyn TenantStorage>,
}

impl TenantStore {
    pub fn storage(&mut self) -> &mut dyn TenantStorage {
        self.storage.as_mut()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantStore {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .extensions
            .get::<ResolvedTenant>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("Tenant storage requested on a route without tenant resolution");
                ApiError::internal_server_error("Tenant context missing")
            })?;

        let storage = state.router.open(&tenant.tenant).await?;
        Ok(Self { tenant, storage })
    }
}
