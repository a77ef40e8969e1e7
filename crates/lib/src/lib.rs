//! Wisecrack core library: Telegram relay that answers a random share of messages
//! with text from an Ollama model.

pub mod app;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod polling;
pub mod random;
pub mod responder;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;
