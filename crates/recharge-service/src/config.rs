//! Service configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use recharge_engine::{WhatsAppConfig, DEFAULT_MAX_CODES_PER_IMPORT};

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL via `DATABASE_URL`.
    Postgres,
    /// Embedded `RocksDB` under `DATA_DIR`.
    RocksDb,
    /// Process memory; data is lost on restart.
    Memory,
}

impl StoreBackend {
    /// Backend name as used in `STORE_BACKEND`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::RocksDb => "rocksdb",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/recharge").
    pub data_dir: String,

    /// PostgreSQL connection string (optional).
    pub database_url: Option<String>,

    /// Explicit backend choice; when unset it is inferred.
    pub store_backend: Option<StoreBackend>,

    /// HS256 secret for tenant tokens. Empty means every request is rejected.
    pub auth_jwt_secret: String,

    /// WhatsApp gateway credentials (optional).
    pub whatsapp: Option<WhatsAppConfig>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Largest accepted code import.
    pub max_codes_per_import: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let store_backend = std::env::var("STORE_BACKEND")
            .ok()
            .and_then(|value| match value.parse() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring STORE_BACKEND");
                    None
                }
            });

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/recharge".into()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            store_backend,
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").unwrap_or_default(),
            whatsapp: load_whatsapp_secrets(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_codes_per_import: std::env::var("MAX_CODES_PER_IMPORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_CODES_PER_IMPORT),
        }
    }

    /// The backend to open: the explicit choice, else PostgreSQL when a
    /// database URL is set, else `RocksDB` when compiled in, else memory.
    #[must_use]
    pub fn resolved_backend(&self) -> StoreBackend {
        if let Some(backend) = self.store_backend {
            return backend;
        }
        if self.database_url.is_some() {
            StoreBackend::Postgres
        } else if cfg!(feature = "rocksdb-backend") {
            StoreBackend::RocksDb
        } else {
            StoreBackend::Memory
        }
    }
}

/// WhatsApp secrets file structure.
#[derive(Debug, Deserialize)]
struct WhatsAppSecrets {
    api_url: String,
    secret: String,
    account: String,
}

/// Load WhatsApp gateway credentials from file or environment.
fn load_whatsapp_secrets() -> Option<WhatsAppConfig> {
    let secret_paths = [
        ".secrets/whatsapp.json",
        "recharge/.secrets/whatsapp.json",
        "recharge/service/.secrets/whatsapp.json",
        "../.secrets/whatsapp.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<WhatsAppSecrets>(path) {
            tracing::info!(path = %path, "Loaded WhatsApp secrets from file");
            return Some(WhatsAppConfig {
                api_url: secrets.api_url,
                secret: secrets.secret,
                account: secrets.account,
            });
        }
    }

    // Fall back to environment variables
    tracing::debug!("WhatsApp secrets file not found, using environment variables");
    let api_url = std::env::var("WHATSAPP_API_URL").ok()?;
    Some(WhatsAppConfig {
        api_url,
        secret: std::env::var("WHATSAPP_SECRET").unwrap_or_default(),
        account: std::env::var("WHATSAPP_ACCOUNT").unwrap_or_default(),
    })
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/recharge".into(),
            database_url: None,
            store_backend: None,
            auth_jwt_secret: String::new(),
            whatsapp: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            max_codes_per_import: DEFAULT_MAX_CODES_PER_IMPORT,
        }
    }
}
