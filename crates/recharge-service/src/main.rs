//! Recharge Service - HTTP API for the recharge back-office
//!
//! This is the main entry point for the recharge service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recharge_service::{create_router, AppState, ServiceConfig, StoreBackend};
use recharge_store::{MemoryStore, PgStore, Store};

/// Pool size for the PostgreSQL backend.
const DATABASE_MAX_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recharge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Recharge Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();
    let backend = config.resolved_backend();

    tracing::info!(
        listen_addr = %config.listen_addr,
        backend = %backend,
        whatsapp_configured = %config.whatsapp.is_some(),
        max_codes_per_import = config.max_codes_per_import,
        "Service configuration loaded"
    );

    let store = open_store(&config, backend).await?;

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the configured storage backend.
async fn open_store(
    config: &ServiceConfig,
    backend: StoreBackend,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or("STORE_BACKEND=postgres requires DATABASE_URL")?;
            tracing::info!("Connecting to PostgreSQL");
            let store = PgStore::connect(url, DATABASE_MAX_CONNECTIONS).await?;
            store.migrate().await?;
            tracing::info!("Database migrations applied");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "rocksdb-backend")]
        StoreBackend::RocksDb => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            Ok(Arc::new(recharge_store::RocksStore::open(&config.data_dir)?))
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StoreBackend::RocksDb => {
            Err("this build has no RocksDB support; enable the rocksdb-backend feature".into())
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store - data will be lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
