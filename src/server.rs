use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::hash_password;
use crate::config::{AppConfig, SecurityConfig, StorageBackend};
use crate::database::models::{AdminRole, AdminUser};
use crate::database::{DatabaseManager, MemoryBackend, PgStorageRouter, PgTenantDirectory};
use crate::handlers::{console, device, public};
use crate::middleware::resolve_tenant_middleware;
use crate::state::AppState;

/// Wires the configured storage backend into shared request state.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    match config.database.backend {
        StorageBackend::Postgres => {
            let manager = Arc::new(DatabaseManager::new(config.database.clone()));
            Ok(AppState::new(
                Arc::new(PgTenantDirectory::new(manager.clone())),
                Arc::new(PgStorageRouter::new(manager)),
                config.tenancy.clone(),
                config.security.clone(),
            ))
        }
        StorageBackend::Memory => {
            let backend = Arc::new(seed_memory_backend(config).await?);
            Ok(AppState::new(
                backend.clone(),
                backend,
                config.tenancy.clone(),
                config.security.clone(),
            ))
        }
    }
}

/// In-process backend holding the seeded tenants, each with a root `admin` account.
pub async fn seed_memory_backend(config: &AppConfig) -> anyhow::Result<MemoryBackend> {
    let backend = MemoryBackend::new(config.database.directory_database.clone());
    let root_hash = hash_password(&config.memory.root_password)
        .context("failed to hash the seeded root password")?;

    for (code, name) in &config.memory.tenants {
        backend.add_tenant(code, name).await;
        backend
            .seed_admin_user(code, AdminUser::ROOT_USERNAME, &root_hash, AdminRole::SuperAdmin)
            .await
            .with_context(|| format!("failed to seed tenant {}", code))?;
        tracing::info!("Seeded in-memory tenant {} ({})", code, name);
    }

    Ok(backend)
}

pub fn app(state: AppState, config: &AppConfig) -> Router {
    let tenant_scoped = Router::new()
        // Camera
        .route("/api/device/getAuthMode", post(device::get_auth_mode))
        .route("/api/device/update", post(device::self_update))
        // Console
        .route("/api/devices", get(console::devices::list).post(console::devices::create))
        .route(
            "/api/devices/:serial_no",
            put(console::devices::update).delete(console::devices::delete),
        )
        .route("/api/devices/:serial_no/history", get(console::devices::history))
        .route(
            "/api/adminusers",
            get(console::admin_users::list).post(console::admin_users::create),
        )
        .route(
            "/api/adminusers/:id",
            put(console::admin_users::update).delete(console::admin_users::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_tenant_middleware,
        ));

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/auth/login", post(public::login))
        .merge(tenant_scoped)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .with_state(state);

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Binds and serves until ctrl-c.
pub async fn serve(config: &AppConfig, port: u16) -> anyhow::Result<()> {
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in {:?}", config.environment);
    }

    let state = build_state(config).await?;
    let app = app(state, config);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!(
        "Device auth API listening on http://{} ({:?}, {:?} storage)",
        bind_addr,
        config.environment,
        config.database.backend
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Device Auth API",
            "version": version,
            "description": "Multi-tenant registration and auth-mode service for body-worn cameras",
            "endpoints": {
                "health": "/health (public)",
                "login": "/api/auth/login (public, resolves its own tenant)",
                "device": "/api/device/getAuthMode, /api/device/update (tenant scoped)",
                "devices": "/api/devices[/:serial_no[/history]] (tenant scoped)",
                "adminusers": "/api/adminusers[/:id] (tenant scoped)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.directory.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "directory": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "tenant directory unavailable",
                    "code": "STORAGE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
