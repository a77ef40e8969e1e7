//! Chat platform (Telegram).
//!
//! The [`ChatGateway`] trait is the seam between the relay and the platform; inbound
//! updates are reduced to [`InboundMessage`] before admission.

mod gateway;
mod inbound;
mod telegram;

pub use gateway::{BotIdentity, ChannelError, ChatGateway, OutboundMessage, ParseMode, SetWebhook};
pub use inbound::{ChatKind, InboundMessage, RepliedMessage, Sender};
pub use telegram::{TelegramChannel, TelegramChat, TelegramMessage, TelegramUpdate, TelegramUser};
