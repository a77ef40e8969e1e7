//! Chat gateway: the operations the relay needs from the chat platform.
//!
//! [`TelegramChannel`](super::TelegramChannel) is the production implementation; tests
//! substitute a recording fake.

use async_trait::async_trait;
use serde::Serialize;

/// Rich-text format for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
}

/// A text message to deliver into a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub parse_mode: Option<ParseMode>,
}

impl OutboundMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            parse_mode: None,
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn markdown(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Markdown);
        self
    }
}

/// The bot's own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

impl BotIdentity {
    /// `@username`, when the bot has one.
    pub fn mention(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("@{}", u))
    }
}

/// setWebhook parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetWebhook {
    pub url: String,
    pub allowed_updates: Vec<String>,
    pub drop_pending_updates: bool,
    pub secret_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telegram {method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

/// Operations consumed from the chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a text message, optionally as a reply and with rich-text parsing.
    async fn send_message(&self, message: OutboundMessage) -> Result<(), ChannelError>;

    /// Send a sticker by file id.
    async fn send_sticker(&self, chat_id: i64, sticker: &str) -> Result<(), ChannelError>;

    /// Show the "typing" action in a conversation.
    async fn send_typing(&self, chat_id: i64) -> Result<(), ChannelError>;

    /// The bot's own identity.
    async fn me(&self) -> Result<BotIdentity, ChannelError>;

    /// Register the inbound webhook. Returns the platform's boolean result.
    async fn set_webhook(&self, request: &SetWebhook) -> Result<bool, ChannelError>;

    /// Remove the inbound webhook.
    async fn delete_webhook(&self) -> Result<bool, ChannelError>;
}
