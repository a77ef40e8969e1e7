//! Inbound message from the chat platform, reduced to what admission and the worker need.

use serde::{Deserialize, Serialize};

use super::telegram::{TelegramMessage, TelegramUser};

/// Kind of conversation a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    /// Channels and anything the platform adds later.
    #[serde(other)]
    Other,
}

/// Who sent a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub full_name: String,
    pub username: Option<String>,
}

/// The message an inbound message replies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepliedMessage {
    pub text: Option<String>,
    pub from: Option<Sender>,
}

/// A message from a conversation. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub message_id: i64,
    pub text: Option<String>,
    pub reply_to: Option<RepliedMessage>,
    pub from: Option<Sender>,
}

impl InboundMessage {
    /// Message text, treating an empty string the same as no text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// True when this message replies to something the given user sent.
    pub fn replies_to(&self, user_id: i64) -> bool {
        self.reply_to
            .as_ref()
            .and_then(|r| r.from.as_ref())
            .is_some_and(|from| from.id == user_id)
    }
}

impl From<&TelegramUser> for Sender {
    fn from(user: &TelegramUser) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name(),
            username: user.username.clone(),
        }
    }
}

impl From<&TelegramMessage> for InboundMessage {
    fn from(msg: &TelegramMessage) -> Self {
        Self {
            chat_id: msg.chat.id,
            chat_kind: msg.chat.kind,
            message_id: msg.message_id,
            text: msg.text.clone(),
            reply_to: msg.reply_to_message.as_deref().map(|r| RepliedMessage {
                text: r.text.clone(),
                from: r.from.as_ref().map(Sender::from),
            }),
            from: msg.from.as_ref().map(Sender::from),
        }
    }
}
