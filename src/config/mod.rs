use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// Base connection URL; its path is swapped for the target database name.
    pub url: Option<String>,
    pub directory_database: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    pub header_name: String,
    pub query_param: String,
    pub cookie_name: String,
    pub cookie_max_age_days: i64,
    /// When false only the verified token claim can select a tenant.
    pub accept_client_sources: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Seed list in `code[:name]` form, comma separated.
    pub tenants: Vec<(String, String)>,
    pub root_password: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("DEVICE_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("STORAGE_BACKEND") {
            self.database.backend = parse_backend(&v).unwrap_or(self.database.backend);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DIRECTORY_DATABASE") {
            self.database.directory_database = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANT_HEADER") {
            self.tenancy.header_name = v;
        }
        if let Ok(v) = env::var("TENANT_QUERY_PARAM") {
            self.tenancy.query_param = v;
        }
        if let Ok(v) = env::var("TENANT_COOKIE") {
            self.tenancy.cookie_name = v;
        }
        if let Ok(v) = env::var("TENANT_COOKIE_MAX_AGE_DAYS") {
            self.tenancy.cookie_max_age_days = v.parse().unwrap_or(self.tenancy.cookie_max_age_days);
        }
        if let Ok(v) = env::var("TENANT_ACCEPT_CLIENT_SOURCES") {
            self.tenancy.accept_client_sources = v.parse().unwrap_or(self.tenancy.accept_client_sources);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Memory backend seed
        if let Ok(v) = env::var("MEMORY_TENANTS") {
            self.memory.tenants = parse_tenant_seed(&v);
        }
        if let Ok(v) = env::var("MEMORY_ROOT_PASSWORD") {
            self.memory.root_password = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: None,
                directory_database: "tenant_directory".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            tenancy: TenancyConfig::default(),
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:5173".to_string()],
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            memory: MemoryConfig {
                tenants: Vec::new(),
                root_password: "admin".to_string(),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.api.enable_request_logging = false;
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 4;
        config
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Tenant-Code".to_string(),
            query_param: "tenantCode".to_string(),
            cookie_name: "tenantCode".to_string(),
            cookie_max_age_days: 30,
            accept_client_sources: true,
        }
    }
}

fn parse_backend(value: &str) -> Option<StorageBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Some(StorageBackend::Postgres),
        "memory" | "mem" => Some(StorageBackend::Memory),
        _ => None,
    }
}

/// Parses `acme:Acme Corp,globex` into `(code, name)` pairs; the name defaults to the code.
pub fn parse_tenant_seed(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((code, name)) => (code.trim().to_string(), name.trim().to_string()),
            None => (entry.to_string(), entry.to_string()),
        })
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database.backend, StorageBackend::Postgres);
        assert_eq!(config.tenancy.header_name, "X-Tenant-Code");
        assert!(config.tenancy.accept_client_sources);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.security.jwt_expiry_hours, 4);
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn parses_tenant_seed_list() {
        let seed = parse_tenant_seed("acme:Acme Corp, globex ,,");
        assert_eq!(
            seed,
            vec![
                ("acme".to_string(), "Acme Corp".to_string()),
                ("globex".to_string(), "globex".to_string()),
            ]
        );
    }

    #[test]
    fn parses_backend_names() {
        assert_eq!(parse_backend("Memory"), Some(StorageBackend::Memory));
        assert_eq!(parse_backend("pg"), Some(StorageBackend::Postgres));
        assert_eq!(parse_backend("sqlite"), None);
    }
}
