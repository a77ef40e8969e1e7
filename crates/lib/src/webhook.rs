//! Registering the inbound webhook at startup and removing it at shutdown.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::channels::{ChatGateway, SetWebhook};
use crate::config::WebhookConfig;
use crate::dispatch::ALLOWED_UPDATES;

/// Where Telegram should deliver updates: `{base_url}/webhook/{key}`, authenticated
/// with `secret` in the `X-Telegram-Bot-Api-Secret-Token` header.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookRegistration {
    base_url: String,
    key: String,
    secret: String,
}

impl WebhookRegistration {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}/webhook/{}", self.base_url, self.key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Key and secret stay out of logs.
impl fmt::Debug for WebhookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookRegistration")
            .field("base_url", &self.base_url)
            .field("key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookState {
    Unregistered,
    Registering,
    Active,
    Deregistered,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook registration failed after {attempts} attempt(s)")]
    Exhausted { attempts: u32 },
    #[error("webhook registration already attempted (state {0:?})")]
    InvalidState(WebhookState),
}

/// Attempts and pause for setWebhook retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl From<&WebhookConfig> for RetryPolicy {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            attempts: config.setup_retries,
            delay: config.setup_retry_delay(),
        }
    }
}

/// Drives the webhook through Unregistered → Registering → Active → Deregistered.
pub struct WebhookLifecycle {
    gateway: Arc<dyn ChatGateway>,
    registration: WebhookRegistration,
    policy: RetryPolicy,
    drop_pending_updates: bool,
    state: WebhookState,
}

impl WebhookLifecycle {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        registration: WebhookRegistration,
        policy: RetryPolicy,
        drop_pending_updates: bool,
    ) -> Self {
        Self {
            gateway,
            registration,
            policy,
            drop_pending_updates,
            state: WebhookState::Unregistered,
        }
    }

    pub fn state(&self) -> WebhookState {
        self.state
    }

    /// Call setWebhook until Telegram answers `true`, pausing between attempts.
    /// Running out of attempts is fatal for startup.
    pub async fn register(&mut self) -> Result<(), WebhookError> {
        if self.state != WebhookState::Unregistered {
            return Err(WebhookError::InvalidState(self.state));
        }
        self.state = WebhookState::Registering;
        let request = SetWebhook {
            url: self.registration.url(),
            allowed_updates: ALLOWED_UPDATES.iter().map(|s| s.to_string()).collect(),
            drop_pending_updates: self.drop_pending_updates,
            secret_token: self.registration.secret().to_string(),
        };
        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            match self.gateway.set_webhook(&request).await {
                Ok(true) => {
                    log::info!(
                        "webhook: registered {}/webhook/<key> (attempt {})",
                        self.registration.base_url,
                        attempt
                    );
                    self.state = WebhookState::Active;
                    return Ok(());
                }
                Ok(false) => {
                    log::warn!("webhook: setWebhook returned false (attempt {}/{})", attempt, attempts);
                }
                Err(e) => {
                    log::warn!("webhook: setWebhook failed (attempt {}/{}): {}", attempt, attempts, e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
        log::error!("webhook: giving up after {} attempt(s)", attempts);
        self.state = WebhookState::Unregistered;
        Err(WebhookError::Exhausted { attempts })
    }

    /// Remove the webhook if it was registered. The outcome is only logged.
    pub async fn deregister(&mut self) {
        if self.state != WebhookState::Active {
            log::debug!("webhook: not active ({:?}), nothing to deregister", self.state);
            return;
        }
        match self.gateway.delete_webhook().await {
            Ok(true) => log::info!("webhook: deregistered"),
            Ok(false) => log::warn!("webhook: deleteWebhook returned false"),
            Err(e) => log::warn!("webhook: deleteWebhook failed: {}", e),
        }
        self.state = WebhookState::Deregistered;
    }
}
