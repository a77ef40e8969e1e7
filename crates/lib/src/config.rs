//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.wisecrack/config.json`) and environment.
//! Secrets (bot token, webhook secret) may come from the environment instead of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channels::ChatKind;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings (webhook, healthcheck, whoami).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Telegram bot settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Generative backend settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Admission and worker settings.
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// HTTP bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; Telegram must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,

    /// Bot API root (default "https://api.telegram.org"). Useful for a local Bot API server.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Webhook registration: Telegram POSTs updates to `{baseUrl}/webhook/{key}` with the secret header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Public base URL of this service (e.g. "https://bot.example.com").
    pub base_url: Option<String>,

    /// Secret path segment appended after `/webhook/`.
    pub key: Option<String>,

    /// Value Telegram sends in X-Telegram-Bot-Api-Secret-Token. Overridden by WISECRACK_WEBHOOK_SECRET env.
    pub secret: Option<String>,

    /// Ask Telegram to drop updates that queued up while no webhook was set.
    #[serde(default = "default_true")]
    pub drop_pending_updates: bool,

    /// How many times setWebhook is attempted before startup is aborted.
    #[serde(default = "default_setup_retries")]
    pub setup_retries: u32,

    /// Pause between setWebhook attempts, in seconds.
    #[serde(default = "default_setup_retry_delay_secs")]
    pub setup_retry_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_setup_retries() -> u32 {
    5
}

fn default_setup_retry_delay_secs() -> u64 {
    3
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            key: None,
            secret: None,
            drop_pending_updates: default_true(),
            setup_retries: default_setup_retries(),
            setup_retry_delay_secs: default_setup_retry_delay_secs(),
        }
    }
}

impl WebhookConfig {
    pub fn setup_retry_delay(&self) -> Duration {
        Duration::from_secs(self.setup_retry_delay_secs)
    }
}

/// Ollama backend config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model name exactly as shown by `ollama list`.
    #[serde(default = "default_ollama_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Inline system prompts; one is picked at random for every generation.
    #[serde(default = "default_system_prompts")]
    pub system_prompts: Vec<String>,

    /// JSON file holding an array of system prompts. Takes precedence over `systemPrompts`.
    /// Relative paths are resolved against the config file's parent.
    #[serde(default)]
    pub system_prompts_path: Option<PathBuf>,
}

fn default_ollama_host() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f64 {
    0.8
}

fn default_system_prompts() -> Vec<String> {
    vec!["You are a helpful assistant.".to_string()]
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            temperature: default_temperature(),
            system_prompts: default_system_prompts(),
            system_prompts_path: None,
        }
    }
}

/// Admission controller and worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderConfig {
    /// Chance of answering per conversation kind.
    #[serde(default)]
    pub probability: ResponseProbabilities,

    /// Maximum number of conversations with a message in flight.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Seconds between typing indicators while a reply is generated.
    #[serde(default = "default_typing_interval_secs")]
    pub typing_interval_secs: u64,

    /// Sticker file id sent on `/start`. No sticker when unset.
    #[serde(default)]
    pub start_sticker: Option<String>,

    /// Sticker file id sent when the bot is added to a group. No sticker when unset.
    #[serde(default)]
    pub welcome_sticker: Option<String>,

    /// Seconds between the messages of the onboarding and welcome sequences.
    #[serde(default = "default_greeting_pause_secs")]
    pub greeting_pause_secs: u64,
}

fn default_max_queue_size() -> usize {
    10
}

fn default_typing_interval_secs() -> u64 {
    4
}

fn default_greeting_pause_secs() -> u64 {
    2
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            probability: ResponseProbabilities::default(),
            max_queue_size: default_max_queue_size(),
            typing_interval_secs: default_typing_interval_secs(),
            start_sticker: None,
            welcome_sticker: None,
            greeting_pause_secs: default_greeting_pause_secs(),
        }
    }
}

impl ResponderConfig {
    pub fn typing_interval(&self) -> Duration {
        Duration::from_secs(self.typing_interval_secs)
    }

    pub fn greeting_pause(&self) -> Duration {
        Duration::from_secs(self.greeting_pause_secs)
    }
}

/// Response probability table, keyed by conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseProbabilities {
    #[serde(default = "default_probability_private")]
    pub private: f64,
    #[serde(default = "default_probability_group")]
    pub group: f64,
    #[serde(default = "default_probability_supergroup")]
    pub supergroup: f64,
}

fn default_probability_private() -> f64 {
    0.2
}

fn default_probability_group() -> f64 {
    0.01
}

fn default_probability_supergroup() -> f64 {
    0.001
}

impl Default for ResponseProbabilities {
    fn default() -> Self {
        Self {
            private: default_probability_private(),
            group: default_probability_group(),
            supergroup: default_probability_supergroup(),
        }
    }
}

impl ResponseProbabilities {
    /// Probability for the given kind; kinds without an entry (e.g. channels) never respond.
    pub fn for_kind(&self, kind: ChatKind) -> f64 {
        match kind {
            ChatKind::Private => self.private,
            ChatKind::Group => self.group,
            ChatKind::Supergroup => self.supergroup,
            ChatKind::Other => 0.0,
        }
    }
}

impl Config {
    /// Check values that serde cannot express. Webhook fields are checked separately by
    /// [`resolve_webhook`] because polling mode does not need them.
    pub fn validate(&self) -> Result<()> {
        let p = &self.responder.probability;
        for (kind, value) in [
            ("private", p.private),
            ("group", p.group),
            ("supergroup", p.supergroup),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!(
                    "responder.probability.{} must be within [0, 1], got {}",
                    kind,
                    value
                );
            }
        }
        if self.responder.typing_interval_secs == 0 {
            anyhow::bail!("responder.typingIntervalSecs must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            anyhow::bail!(
                "ollama.temperature must be within [0, 2], got {}",
                self.ollama.temperature
            );
        }
        if self.ollama.system_prompts_path.is_none() && self.ollama.system_prompts.is_empty() {
            anyhow::bail!("ollama.systemPrompts must contain at least one prompt");
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    non_empty_env("TELEGRAM_BOT_TOKEN").or_else(|| non_empty(config.telegram.bot_token.as_ref()))
}

/// Resolve the webhook secret: env WISECRACK_WEBHOOK_SECRET overrides config.
pub fn resolve_webhook_secret(config: &Config) -> Option<String> {
    non_empty_env("WISECRACK_WEBHOOK_SECRET")
        .or_else(|| non_empty(config.telegram.webhook.secret.as_ref()))
}

/// Build the webhook registration from config; all three parts are required in webhook mode.
pub fn resolve_webhook(config: &Config) -> Result<crate::webhook::WebhookRegistration> {
    let hook = &config.telegram.webhook;
    let base_url = non_empty(hook.base_url.as_ref())
        .context("telegram.webhook.baseUrl is required to serve a webhook")?;
    let key = non_empty(hook.key.as_ref())
        .context("telegram.webhook.key is required to serve a webhook")?;
    let secret = resolve_webhook_secret(config).context(
        "telegram.webhook.secret (or WISECRACK_WEBHOOK_SECRET) is required to serve a webhook",
    )?;
    Ok(crate::webhook::WebhookRegistration::new(base_url, key, secret))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WISECRACK_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".wisecrack").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Resolve `ollama.systemPromptsPath` against the config file's parent.
pub fn resolve_system_prompts_path(config: &Config, config_path: &Path) -> Option<PathBuf> {
    let p = config.ollama.system_prompts_path.as_ref()?;
    if p.as_os_str().is_empty() {
        return None;
    }
    if p.is_absolute() {
        return Some(p.clone());
    }
    let parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some(parent.join(p))
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    config
        .validate()
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok((config, path))
}
