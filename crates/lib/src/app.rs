//! Wiring shared by webhook and polling mode: clients, admission, worker, dispatcher.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::channels::{ChatGateway, TelegramChannel};
use crate::config::{self, Config};
use crate::dispatch::{Dispatcher, Greetings};
use crate::llm::{OllamaClient, SystemPrompts};
use crate::random::{RandomSource, ThreadRandom};
use crate::responder::{AdmissionController, ConversationQueue, InFlight, MessageWorker};

/// Everything a running bot needs. The worker is taken out and spawned by the caller.
pub struct App {
    pub telegram: Arc<TelegramChannel>,
    pub dispatcher: Arc<Dispatcher>,
    pub worker: MessageWorker,
}

impl App {
    pub fn build(config: &Config, config_path: &Path) -> Result<Self> {
        let token = config::resolve_telegram_token(config)
            .context("telegram bot token is required (telegram.botToken or TELEGRAM_BOT_TOKEN)")?;
        let telegram = Arc::new(TelegramChannel::new(token, config.telegram.api_base.clone()));
        let gateway: Arc<dyn ChatGateway> = telegram.clone();

        let prompts = match config::resolve_system_prompts_path(config, config_path) {
            Some(path) => SystemPrompts::load(&path)?,
            None => SystemPrompts::new(config.ollama.system_prompts.clone())
                .context("ollama.systemPrompts")?,
        };
        let ollama = OllamaClient::new(
            Some(config.ollama.host.clone()),
            config.ollama.model.clone(),
            config.ollama.temperature,
        );
        log::info!(
            "ollama: using model {} at {} with {} system prompt(s)",
            ollama.model(),
            config.ollama.host,
            prompts.len()
        );

        let random: Arc<dyn RandomSource> = Arc::new(ThreadRandom);
        let queue = Arc::new(ConversationQueue::new());
        let in_flight = Arc::new(InFlight::new());
        let responder = &config.responder;
        let admission = Arc::new(AdmissionController::new(
            gateway.clone(),
            random.clone(),
            responder.probability,
            responder.max_queue_size,
            queue.clone(),
            in_flight.clone(),
        ));
        let worker = MessageWorker::new(
            gateway.clone(),
            Arc::new(ollama),
            prompts,
            random,
            queue,
            in_flight,
            responder.typing_interval(),
        );
        let dispatcher = Arc::new(Dispatcher::new(gateway, admission, Greetings::from(responder)));

        Ok(Self {
            telegram,
            dispatcher,
            worker,
        })
    }
}
