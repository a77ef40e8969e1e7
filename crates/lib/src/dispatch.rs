//! Routes raw updates: onboarding on `/start`, a welcome when added to a group,
//! and everything else with usable text to admission.

use std::sync::Arc;
use std::time::Duration;

use crate::channels::{ChannelError, ChatGateway, InboundMessage, OutboundMessage, TelegramMessage, TelegramUpdate};
use crate::config::ResponderConfig;
use crate::responder::replies::{
    START_CALL_TO_ACTION, START_INTRO, WELCOME_ANNOUNCEMENT, WELCOME_INTRODUCTION,
};
use crate::responder::{AdmissionController, Decision, ProcessingContext};

/// Update types the dispatcher consumes; passed as `allowed_updates` to Telegram.
pub const ALLOWED_UPDATES: &[&str] = &["message"];

/// Text length (in characters) a message needs to be considered for a reply.
const MIN_TEXT_CHARS: usize = 3;
const MAX_TEXT_CHARS: usize = 300;

/// Stickers and pacing for the onboarding and welcome sequences.
#[derive(Debug, Clone, Default)]
pub struct Greetings {
    pub start_sticker: Option<String>,
    pub welcome_sticker: Option<String>,
    pub pause: Duration,
}

impl From<&ResponderConfig> for Greetings {
    fn from(config: &ResponderConfig) -> Self {
        Self {
            start_sticker: config.start_sticker.clone(),
            welcome_sticker: config.welcome_sticker.clone(),
            pause: config.greeting_pause(),
        }
    }
}

/// Where an update went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Onboarding,
    Welcome,
    Admission(Decision),
    Ignored,
}

pub struct Dispatcher {
    gateway: Arc<dyn ChatGateway>,
    admission: Arc<AdmissionController>,
    greetings: Greetings,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        admission: Arc<AdmissionController>,
        greetings: Greetings,
    ) -> Self {
        Self {
            gateway,
            admission,
            greetings,
        }
    }

    /// Route one update. `request_id` identifies the delivery (webhook request) in logs.
    pub async fn feed_update(&self, update: TelegramUpdate, request_id: Option<String>) -> Routed {
        let mut context = ProcessingContext::from_update(&update);
        if let Some(id) = request_id {
            context = context.with_request_id(id);
        }
        let Some(message) = update.message else {
            log::debug!("dispatch: [{}] update without message, ignoring", context);
            return Routed::Ignored;
        };

        if message.text.as_deref().is_some_and(is_start_command) {
            if let Err(e) = self.onboard(message.chat.id).await {
                log::warn!("dispatch: [{}] onboarding failed: {}", context, e);
            }
            return Routed::Onboarding;
        }

        if self.bot_was_added(&message, &context).await {
            if let Err(e) = self.welcome(message.chat.id).await {
                log::warn!("dispatch: [{}] welcome failed: {}", context, e);
            }
            return Routed::Welcome;
        }

        let considered = message
            .text
            .as_deref()
            .map(|t| t.chars().count())
            .is_some_and(|n| (MIN_TEXT_CHARS..=MAX_TEXT_CHARS).contains(&n));
        if !considered {
            log::debug!("dispatch: [{}] no text of usable length, ignoring", context);
            return Routed::Ignored;
        }

        let inbound = InboundMessage::from(&message);
        Routed::Admission(self.admission.consider(inbound, context).await)
    }

    async fn bot_was_added(&self, message: &TelegramMessage, context: &ProcessingContext) -> bool {
        let Some(members) = message.new_chat_members.as_ref().filter(|m| !m.is_empty()) else {
            return false;
        };
        match self.gateway.me().await {
            Ok(me) => members.iter().any(|m| m.id == me.id),
            Err(e) => {
                log::warn!("dispatch: [{}] bot identity unavailable: {}", context, e);
                false
            }
        }
    }

    /// Sticker, typing, intro, typing, call to action.
    async fn onboard(&self, chat_id: i64) -> Result<(), ChannelError> {
        if let Some(sticker) = &self.greetings.start_sticker {
            self.gateway.send_sticker(chat_id, sticker).await?;
        }
        self.type_and_pause(chat_id).await?;
        self.gateway
            .send_message(OutboundMessage::new(chat_id, START_INTRO).markdown())
            .await?;
        self.type_and_pause(chat_id).await?;
        self.gateway
            .send_message(OutboundMessage::new(chat_id, START_CALL_TO_ACTION))
            .await
    }

    /// Announcement, sticker, typing, introduction.
    async fn welcome(&self, chat_id: i64) -> Result<(), ChannelError> {
        self.gateway
            .send_message(OutboundMessage::new(chat_id, WELCOME_ANNOUNCEMENT).markdown())
            .await?;
        if let Some(sticker) = &self.greetings.welcome_sticker {
            self.gateway.send_sticker(chat_id, sticker).await?;
        }
        self.type_and_pause(chat_id).await?;
        self.gateway
            .send_message(OutboundMessage::new(chat_id, WELCOME_INTRODUCTION))
            .await
    }

    async fn type_and_pause(&self, chat_id: i64) -> Result<(), ChannelError> {
        self.gateway.send_typing(chat_id).await?;
        tokio::time::sleep(self.greetings.pause).await;
        Ok(())
    }
}

/// `/start`, `/start@botname` and `/start <payload>`.
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    command.split('@').next() == Some("/start")
}
