//! Telegram channel: Bot API calls (sendMessage, setWebhook, ...) and the getUpdates long-poll loop.

use crate::channels::gateway::{
    BotIdentity, ChannelError, ChatGateway, OutboundMessage, ParseMode, SetWebhook,
};
use crate::channels::inbound::ChatKind;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LONG_POLL_TIMEOUT: u64 = 30;

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram update payload (getUpdates result item or webhook POST body).
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<TelegramMessage>>,
    #[serde(default)]
    pub new_chat_members: Option<Vec<TelegramUser>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TelegramUser {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Telegram Bot API client. Also drives long polling when no webhook is used.
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: reqwest::Client,
    me: OnceCell<BotIdentity>,
    shutdown: CancellationToken,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            me: OnceCell::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop the long-poll loop (no effect in webhook mode).
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// POST a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<T, ChannelError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let res = self.client.post(&url).json(&body).send().await?;
        let status = res.status();
        let text = res.text().await?;
        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                return Err(ChannelError::Api {
                    method,
                    description: format!("{} (undecodable body: {})", status, e),
                })
            }
        };
        if !envelope.ok {
            return Err(ChannelError::Api {
                method,
                description: envelope
                    .description
                    .unwrap_or_else(|| format!("{} ok: false", status)),
            });
        }
        envelope.result.ok_or_else(|| ChannelError::Api {
            method,
            description: "missing result".to_string(),
        })
    }

    /// Call getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), ChannelError> {
        let mut body = json!({
            "timeout": LONG_POLL_TIMEOUT,
            "allowed_updates": crate::dispatch::ALLOWED_UPDATES,
        });
        if let Some(off) = offset {
            body["offset"] = json!(off);
        }
        let updates: Vec<TelegramUpdate> = self.call("getUpdates", body).await?;
        let next_offset = updates.iter().map(|u| u.update_id).max().map(|id| id + 1);
        Ok((updates, next_offset))
    }

    /// Start the getUpdates long-poll loop and forward updates to `updates_tx`.
    /// Returns a handle to await on shutdown.
    pub fn start_polling(
        self: std::sync::Arc<Self>,
        updates_tx: mpsc::Sender<TelegramUpdate>,
    ) -> JoinHandle<()> {
        log::info!("telegram: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, updates_tx).await;
        })
    }
}

async fn run_get_updates_loop(
    channel: std::sync::Arc<TelegramChannel>,
    updates_tx: mpsc::Sender<TelegramUpdate>,
) {
    let mut offset: Option<i64> = None;
    loop {
        let polled = tokio::select! {
            _ = channel.shutdown.cancelled() => break,
            polled = channel.get_updates(offset) => polled,
        };
        match polled {
            Ok((updates, next)) => {
                if next.is_some() {
                    offset = next;
                }
                for u in updates {
                    if updates_tx.send(u).await.is_err() {
                        log::debug!("telegram: update channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("telegram: getUpdates error: {}", e);
                tokio::select! {
                    _ = channel.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(2)) => {}
                }
            }
        }
    }
    log::info!("telegram: getUpdates loop stopped");
}

#[derive(Debug, Deserialize)]
struct GetMeResult {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[async_trait]
impl ChatGateway for TelegramChannel {
    async fn send_message(&self, message: OutboundMessage) -> Result<(), ChannelError> {
        let mut body = json!({ "chat_id": message.chat_id, "text": message.text });
        if let Some(id) = message.reply_to {
            body["reply_to_message_id"] = json!(id);
        }
        if let Some(ParseMode::Markdown) = message.parse_mode {
            body["parse_mode"] = json!("Markdown");
        }
        let _: serde_json::Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn send_sticker(&self, chat_id: i64, sticker: &str) -> Result<(), ChannelError> {
        let body = json!({ "chat_id": chat_id, "sticker": sticker });
        let _: serde_json::Value = self.call("sendSticker", body).await?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), ChannelError> {
        let body = json!({ "chat_id": chat_id, "action": "typing" });
        let _: bool = self.call("sendChatAction", body).await?;
        Ok(())
    }

    async fn me(&self) -> Result<BotIdentity, ChannelError> {
        let me = self
            .me
            .get_or_try_init(|| async {
                let me: GetMeResult = self.call("getMe", json!({})).await?;
                log::info!(
                    "telegram: bot identity {} (@{})",
                    me.id,
                    me.username.as_deref().unwrap_or("-")
                );
                Ok::<_, ChannelError>(BotIdentity {
                    id: me.id,
                    username: me.username,
                })
            })
            .await?;
        Ok(me.clone())
    }

    async fn set_webhook(&self, request: &SetWebhook) -> Result<bool, ChannelError> {
        let body = json!({
            "url": request.url,
            "allowed_updates": request.allowed_updates,
            "drop_pending_updates": request.drop_pending_updates,
            "secret_token": request.secret_token,
        });
        self.call("setWebhook", body).await
    }

    async fn delete_webhook(&self) -> Result<bool, ChannelError> {
        self.call("deleteWebhook", json!({})).await
    }
}
