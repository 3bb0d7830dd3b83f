#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use device_auth_api::auth::password::sha256_hex;
use device_auth_api::config::AppConfig;
use device_auth_api::database::models::AdminRole;
use device_auth_api::database::MemoryBackend;
use device_auth_api::{app, AppState};
use serde_json::Value;
use tower::ServiceExt;

pub const TENANTS: [&str; 2] = ["acme", "globex"];
pub const ROOT_PASSWORD: &str = "root-pass";

/// Full router over an in-memory backend with two tenants, each holding a root `admin`.
pub struct TestApp {
    pub backend: Arc<MemoryBackend>,
    pub router: Router,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::development()).await
    }

    pub async fn with_config(mut config: AppConfig) -> Self {
        config.api.enable_request_logging = false;

        let backend = Arc::new(MemoryBackend::new(config.database.directory_database.clone()));
        // Legacy digest keeps seeding cheap; the first login upgrades it
        let root_hash = sha256_hex(ROOT_PASSWORD);
        for code in TENANTS {
            backend.add_tenant(code, &code.to_uppercase()).await;
            backend
                .seed_admin_user(code, "admin", &root_hash, AdminRole::SuperAdmin)
                .await
                .expect("seed root admin");
        }

        let state = AppState::new(
            backend.clone(),
            backend.clone(),
            config.tenancy.clone(),
            config.security.clone(),
        );
        let router = app(state, &config);

        Self {
            backend,
            router,
            config,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// JSON request scoped to `tenant` through the tenant header.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        tenant: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-Code", tenant);
        }
        self.request(with_json(builder, body)).await
    }

    pub async fn get_auth_mode(&self, tenant: &str, serial_no: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/device/getAuthMode",
            Some(tenant),
            Some(serde_json::json!({ "serialNo": serial_no })),
        )
        .await
    }
}

pub fn with_json(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request"),
        None => builder.body(Body::empty()).expect("valid request"),
    }
}

/// The real binary, started on a free port against the memory backend and killed on drop.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_device-auth-api"))
            .arg("serve")
            .env("PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("STORAGE_BACKEND", "memory")
            .env("MEMORY_TENANTS", "acme:Acme Corp,globex")
            .env("MEMORY_ROOT_PASSWORD", ROOT_PASSWORD)
            .env("JWT_SECRET", "smoke-test-secret")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        let server = Self {
            port,
            base_url,
            child,
        };
        server.wait_ready(Duration::from_secs(15)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
