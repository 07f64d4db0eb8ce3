//! Customer notifications.
//!
//! The engine only needs `notify(recipient, message) -> outcome`. Delivery is
//! best effort: callers log a failed [`NotifyOutcome`] and carry on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Maximum number of delivery attempts.
const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration for retries (doubles with each attempt).
const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff duration for retries.
const MAX_BACKOFF_MS: u64 = 5000;

/// Result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyOutcome {
    /// Whether the message was accepted for delivery.
    pub success: bool,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotifyOutcome {
    /// A successful delivery.
    #[must_use]
    pub const fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed delivery.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Delivers a text message to a customer.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to `recipient` (a phone number). Never fails; problems
    /// are reported in the outcome.
    async fn notify(&self, recipient: &str, message: &str) -> NotifyOutcome;
}

/// Error type for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error status.
    #[error("gateway error: {status} - {error}")]
    Gateway {
        /// HTTP status code.
        status: u16,
        /// Response body or message.
        error: String,
    },

    /// The gateway accepted the request but refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl NotifyError {
    /// Network failures and 5xx answers are worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Gateway { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected(_) | Self::Configuration(_) => false,
        }
    }
}

/// Credentials for the WhatsApp gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    /// Send endpoint, e.g. `https://gateway.example.com/api/send/whatsapp`.
    pub api_url: String,
    /// Account secret.
    pub secret: String,
    /// Sending account identifier.
    pub account: String,
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// WhatsApp gateway client.
///
/// Sends a form-encoded POST per message and retries transient failures with
/// exponential backoff.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: Client,
    config: WhatsAppConfig,
    initial_backoff: Duration,
}

impl WhatsAppClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Configuration` if the URL is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: WhatsAppConfig) -> Result<Self, NotifyError> {
        if config.api_url.trim().is_empty() {
            return Err(NotifyError::Configuration("gateway URL is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first retry delay.
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Send one message, without retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the gateway refuses it.
    pub async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let form = [
            ("secret", self.config.secret.as_str()),
            ("account", self.config.account.as_str()),
            ("priority", "1"),
            ("recipient", recipient),
            ("type", "text"),
            ("message", message),
        ];

        let response = self
            .client
            .post(&self.config.api_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<GatewayReply>(&body) {
            Ok(reply) if reply.success => Ok(()),
            Ok(reply) if status.is_success() => Err(NotifyError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| "unknown gateway error".to_string()),
            )),
            Ok(reply) => Err(NotifyError::Gateway {
                status: status.as_u16(),
                error: reply.error.unwrap_or(body),
            }),
            Err(_) => Err(NotifyError::Gateway {
                status: status.as_u16(),
                error: body,
            }),
        }
    }

    /// Send with up to three attempts and exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// non-transient error.
    pub async fn send_with_retry(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;
        let max_backoff = Duration::from_millis(MAX_BACKOFF_MS);

        loop {
            match self.send(recipient, message).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;

                    if attempt >= MAX_ATTEMPTS || !e.is_transient() {
                        tracing::warn!(
                            recipient = %recipient,
                            attempt = %attempt,
                            error = %e,
                            "WhatsApp delivery failed"
                        );
                        return Err(e);
                    }

                    tracing::debug!(
                        recipient = %recipient,
                        attempt = %attempt,
                        backoff_ms = %backoff.as_millis(),
                        error = %e,
                        "WhatsApp delivery failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for WhatsAppClient {
    async fn notify(&self, recipient: &str, message: &str) -> NotifyOutcome {
        match self.send_with_retry(recipient, message).await {
            Ok(()) => NotifyOutcome::delivered(),
            Err(e) => NotifyOutcome::failed(e.to_string()),
        }
    }
}

/// Notifier used when no gateway is configured: logs and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> NotifyOutcome {
        tracing::info!(
            recipient = %recipient,
            message_len = message.len(),
            "Notification not sent (no gateway configured)"
        );
        NotifyOutcome::delivered()
    }
}
