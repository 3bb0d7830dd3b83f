use axum::extract::Query;
use axum::http::{header, HeaderMap, Uri};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth;
use crate::config::TenancyConfig;
use crate::database::models::Tenant;
use crate::database::{DatabaseError, TenantDirectory};

/// Where a tenant code was found, in descending order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TenantSource {
    TokenClaim,
    Header,
    Query,
    Cookie,
    /// Explicit `tenantCode` in the login request body.
    LoginBody,
}

impl TenantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSource::TokenClaim => "token_claim",
            TenantSource::Header => "header",
            TenantSource::Query => "query",
            TenantSource::Cookie => "cookie",
            TenantSource::LoginBody => "login_body",
        }
    }
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No tenant identifier was supplied")]
    MissingTenantIdentifier,
    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),
    #[error("Invalid identity token: {0}")]
    InvalidToken(String),
    #[error(transparent)]
    Directory(#[from] DatabaseError),
}

/// A tenant confirmed to exist in the directory, plus the source that named it.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    pub source: TenantSource,
}

impl ResolvedTenant {
    pub fn code(&self) -> &str {
        &self.tenant.tenant_code
    }
}

/// One candidate source for the tenant code.
pub trait TenantExtractor: Send + Sync {
    fn source(&self) -> TenantSource;

    /// `Ok(None)` when this source carries nothing usable. Errors abort resolution.
    fn extract(&self, headers: &HeaderMap, uri: &Uri) -> Result<Option<String>, ResolveError>;
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `tenant` claim of a verified bearer token. A token that is present but fails verification
/// rejects the request rather than falling through to weaker sources.
pub struct TokenClaimExtractor {
    secret: String,
}

impl TokenClaimExtractor {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl TenantExtractor for TokenClaimExtractor {
    fn source(&self) -> TenantSource {
        TenantSource::TokenClaim
    }

    fn extract(&self, headers: &HeaderMap, _uri: &Uri) -> Result<Option<String>, ResolveError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| ResolveError::InvalidToken("Invalid Authorization header format".into()))?;
        // Scheme names are case-insensitive
        let Some(token) = value
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token)
        else {
            return Ok(None);
        };
        if token.trim().is_empty() {
            return Ok(None);
        }

        let claims = auth::validate_jwt(token.trim(), &self.secret)
            .map_err(|e| ResolveError::InvalidToken(e.to_string()))?;
        Ok(non_blank(&claims.tenant))
    }
}

pub struct HeaderExtractor {
    name: String,
}

impl HeaderExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TenantExtractor for HeaderExtractor {
    fn source(&self) -> TenantSource {
        TenantSource::Header
    }

    fn extract(&self, headers: &HeaderMap, _uri: &Uri) -> Result<Option<String>, ResolveError> {
        Ok(headers
            .get(self.name.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(non_blank))
    }
}

pub struct QueryExtractor {
    param: String,
}

impl QueryExtractor {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

impl TenantExtractor for QueryExtractor {
    fn source(&self) -> TenantSource {
        TenantSource::Query
    }

    fn extract(&self, _headers: &HeaderMap, uri: &Uri) -> Result<Option<String>, ResolveError> {
        if uri.query().is_none() {
            return Ok(None);
        }
        // An unparseable query string simply yields nothing
        let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(uri) else {
            return Ok(None);
        };
        Ok(params.get(&self.param).and_then(|v| non_blank(v)))
    }
}

pub struct CookieExtractor {
    name: String,
}

impl CookieExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TenantExtractor for CookieExtractor {
    fn source(&self) -> TenantSource {
        TenantSource::Cookie
    }

    fn extract(&self, headers: &HeaderMap, _uri: &Uri) -> Result<Option<String>, ResolveError> {
        let found = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .and_then(|(_, value)| non_blank(value));
        Ok(found)
    }
}

/// Runs the extractors in order and confirms the first hit against the directory.
pub struct TenantResolver {
    extractors: Vec<Box<dyn TenantExtractor>>,
    directory: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    pub fn new(extractors: Vec<Box<dyn TenantExtractor>>, directory: Arc<dyn TenantDirectory>) -> Self {
        Self {
            extractors,
            directory,
        }
    }

    /// Token claim, then header, query and cookie. With client sources disabled only the
    /// verified token claim is consulted.
    pub fn from_config(
        tenancy: &TenancyConfig,
        jwt_secret: &str,
        directory: Arc<dyn TenantDirectory>,
    ) -> Self {
        let mut extractors: Vec<Box<dyn TenantExtractor>> =
            vec![Box::new(TokenClaimExtractor::new(jwt_secret))];
        if tenancy.accept_client_sources {
            extractors.push(Box::new(HeaderExtractor::new(tenancy.header_name.clone())));
            extractors.push(Box::new(QueryExtractor::new(tenancy.query_param.clone())));
            extractors.push(Box::new(CookieExtractor::new(tenancy.cookie_name.clone())));
        }
        Self::new(extractors, directory)
    }

    /// First non-blank candidate. Touches neither the directory nor tenant storage.
    pub fn identify(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<(String, TenantSource), ResolveError> {
        for extractor in &self.extractors {
            if let Some(code) = extractor.extract(headers, uri)? {
                return Ok((code, extractor.source()));
            }
        }
        Err(ResolveError::MissingTenantIdentifier)
    }

    pub async fn confirm(
        &self,
        code: &str,
        source: TenantSource,
    ) -> Result<ResolvedTenant, ResolveError> {
        match self.directory.find_active(code).await? {
            Some(tenant) => {
                debug!("Resolved tenant {} from {}", tenant.tenant_code, source);
                Ok(ResolvedTenant { tenant, source })
            }
            None => {
                warn!("Tenant {} from {} is not in the directory", code, source);
                Err(ResolveError::UnknownTenant(code.to_string()))
            }
        }
    }

    pub async fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Result<ResolvedTenant, ResolveError> {
        let (code, source) = self.identify(headers, uri).map_err(|e| {
            warn!("Tenant resolution failed: {}", e);
            e
        })?;
        self.confirm(&code, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt, Claims};
    use crate::database::MemoryBackend;
    use axum::http::HeaderValue;

    const SECRET: &str = "resolver-secret";

    async fn resolver(accept_client_sources: bool) -> TenantResolver {
        let backend = MemoryBackend::default();
        backend.add_tenant("acme", "Acme").await;
        backend.add_tenant("globex", "Globex").await;
        backend.add_tenant("initech", "Initech").await;
        backend.add_tenant("umbrella", "Umbrella").await;
        let tenancy = TenancyConfig {
            accept_client_sources,
            ..TenancyConfig::default()
        };
        TenantResolver::from_config(&tenancy, SECRET, Arc::new(backend))
    }

    fn bearer(tenant: &str, secret: &str) -> HeaderValue {
        let claims = Claims::new(tenant.into(), "admin".into(), "super_admin".into(), 1);
        let token = generate_jwt(&claims, secret).unwrap();
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    fn all_sources() -> (HeaderMap, Uri) {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer("acme", SECRET));
        headers.insert("x-tenant-code", HeaderValue::from_static("globex"));
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; tenantCode=umbrella"));
        let uri: Uri = "/api/devices?tenantCode=initech".parse().unwrap();
        (headers, uri)
    }

    #[tokio::test]
    async fn precedence_is_token_header_query_cookie() {
        let resolver = resolver(true).await;
        let (mut headers, uri) = all_sources();

        let resolved = resolver.resolve(&headers, &uri).await.unwrap();
        assert_eq!((resolved.code(), resolved.source), ("acme", TenantSource::TokenClaim));

        headers.remove(header::AUTHORIZATION);
        let resolved = resolver.resolve(&headers, &uri).await.unwrap();
        assert_eq!((resolved.code(), resolved.source), ("globex", TenantSource::Header));

        headers.remove("x-tenant-code");
        let resolved = resolver.resolve(&headers, &uri).await.unwrap();
        assert_eq!((resolved.code(), resolved.source), ("initech", TenantSource::Query));

        let bare: Uri = "/api/devices".parse().unwrap();
        let resolved = resolver.resolve(&headers, &bare).await.unwrap();
        assert_eq!((resolved.code(), resolved.source), ("umbrella", TenantSource::Cookie));
    }

    #[tokio::test]
    async fn blank_sources_are_skipped() {
        let resolver = resolver(true).await;
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-code", HeaderValue::from_static("   "));
        let uri: Uri = "/api/devices?tenantCode=%20&x=1".parse().unwrap();
        headers.insert(header::COOKIE, HeaderValue::from_static("tenantCode=globex"));

        let resolved = resolver.resolve(&headers, &uri).await.unwrap();
        assert_eq!(resolved.source, TenantSource::Cookie);
        assert_eq!(resolved.code(), "globex");
    }

    #[tokio::test]
    async fn nothing_supplied_is_missing_identifier() {
        let resolver = resolver(true).await;
        let uri: Uri = "/api/devices".parse().unwrap();
        assert!(matches!(
            resolver.resolve(&HeaderMap::new(), &uri).await,
            Err(ResolveError::MissingTenantIdentifier)
        ));
    }

    #[tokio::test]
    async fn unknown_code_is_rejected() {
        let resolver = resolver(true).await;
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-code", HeaderValue::from_static("nobody"));
        let uri: Uri = "/".parse().unwrap();
        assert!(matches!(
            resolver.resolve(&headers, &uri).await,
            Err(ResolveError::UnknownTenant(code)) if code == "nobody"
        ));
    }

    #[tokio::test]
    async fn forged_token_fails_closed() {
        let resolver = resolver(true).await;
        let (mut headers, uri) = all_sources();
        headers.insert(header::AUTHORIZATION, bearer("acme", "forged"));
        assert!(matches!(
            resolver.resolve(&headers, &uri).await,
            Err(ResolveError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn bearer_scheme_is_case_insensitive() {
        let resolver = resolver(true).await;
        let (mut headers, uri) = all_sources();

        let token = bearer("acme", "forged");
        let lowered = token.to_str().unwrap().replacen("Bearer", "bearer", 1);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&lowered).unwrap());
        assert!(matches!(
            resolver.resolve(&headers, &uri).await,
            Err(ResolveError::InvalidToken(_))
        ));

        let token = bearer("acme", SECRET);
        let upper = token.to_str().unwrap().replacen("Bearer", "BEARER", 1);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&upper).unwrap());
        let resolved = resolver.resolve(&headers, &uri).await.unwrap();
        assert_eq!((resolved.code(), resolved.source), ("acme", TenantSource::TokenClaim));
    }

    #[tokio::test]
    async fn client_sources_can_be_disabled() {
        let resolver = resolver(false).await;
        let (mut headers, uri) = all_sources();
        headers.remove(header::AUTHORIZATION);
        assert!(matches!(
            resolver.resolve(&headers, &uri).await,
            Err(ResolveError::MissingTenantIdentifier)
        ));
    }
}
