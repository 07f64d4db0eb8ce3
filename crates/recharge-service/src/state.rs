//! Application state.

use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use recharge_engine::{Engine, EngineConfig, LogNotifier, Notifier, WhatsAppClient};
use recharge_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The recharge engine.
    pub engine: Engine,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Key for verifying tenant tokens.
    pub decoding_key: DecodingKey,
}

impl AppState {
    /// Create application state, sending notifications through the WhatsApp
    /// gateway when it is configured and to the log otherwise.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let notifier: Arc<dyn Notifier> = match config.whatsapp.clone().map(WhatsAppClient::new) {
            Some(Ok(client)) => {
                tracing::info!("WhatsApp notifications enabled");
                Arc::new(client)
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to create WhatsApp client");
                Arc::new(LogNotifier)
            }
            None => {
                tracing::warn!("WhatsApp not configured - notifications will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Self::with_notifier(store, notifier, config)
    }

    /// Create application state with an explicit notifier.
    #[must_use]
    pub fn with_notifier(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Self {
        if config.auth_jwt_secret.is_empty() {
            tracing::warn!("AUTH_JWT_SECRET not set - all authenticated requests will be rejected");
        }

        let engine = Engine::new(
            store,
            notifier,
            EngineConfig {
                max_codes_per_import: config.max_codes_per_import,
            },
        );
        let decoding_key = DecodingKey::from_secret(config.auth_jwt_secret.as_bytes());

        Self {
            engine,
            config,
            decoding_key,
        }
    }
}
