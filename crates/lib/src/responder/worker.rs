//! Single consumer that turns queued messages into generated replies.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::context::ProcessingContext;
use super::inflight::InFlight;
use super::queue::{ConversationQueue, QueuedItem};
use super::replies::ERROR_REPLY;
use super::typing::TypingIndicator;
use crate::channels::{ChannelError, ChatGateway, InboundMessage, OutboundMessage};
use crate::llm::{LlmError, SystemPrompts, TextGenerator};
use crate::random::RandomSource;

/// Per-item failures. All are recovered; none stop the worker loop.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("queued message has no text")]
    EmptyPrompt,
    #[error("generation failed: {0}")]
    Backend(#[from] LlmError),
    #[error("delivering reply failed: {0}")]
    Delivery(#[from] ChannelError),
}

/// How an item finished when nothing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Processed {
    Replied,
    /// Only a bot mention was left after cleanup; nothing to ask the backend.
    NothingToAsk,
}

/// Drains the conversation queue one item at a time.
pub struct MessageWorker {
    gateway: Arc<dyn ChatGateway>,
    generator: Arc<dyn TextGenerator>,
    prompts: SystemPrompts,
    random: Arc<dyn RandomSource>,
    queue: Arc<ConversationQueue>,
    in_flight: Arc<InFlight>,
    typing_interval: Duration,
}

impl MessageWorker {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        generator: Arc<dyn TextGenerator>,
        prompts: SystemPrompts,
        random: Arc<dyn RandomSource>,
        queue: Arc<ConversationQueue>,
        in_flight: Arc<InFlight>,
        typing_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            generator,
            prompts,
            random,
            queue,
            in_flight,
            typing_interval,
        }
    }

    /// Process items forever. Only process shutdown ends this.
    pub async fn run(self) {
        log::info!("worker: started");
        loop {
            let item = self.queue.pop().await;
            self.process(item).await;
        }
    }

    /// Handle one item. Errors and panics are logged and answered with the stock
    /// error reply; the conversation's slot is released and the item marked done
    /// on every path.
    pub async fn process(&self, item: QueuedItem) {
        let QueuedItem { message, context } = item;
        log::info!(
            "worker: [{}] processing message {} from chat {}",
            context,
            message.message_id,
            message.chat_id
        );

        let outcome = AssertUnwindSafe(self.handle(&message, &context))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(Processed::Replied)) => {
                log::info!("worker: [{}] replied in chat {}", context, message.chat_id);
            }
            Ok(Ok(Processed::NothingToAsk)) => {
                log::debug!("worker: [{}] prompt empty after cleanup, skipping", context);
            }
            Ok(Err(e)) => {
                log::error!("worker: [{}] {}", context, e);
                self.send_error_reply(&message, &context).await;
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("worker: [{}] panicked while processing: {}", context, reason);
                self.send_error_reply(&message, &context).await;
            }
        }

        self.in_flight.release(message.chat_id);
        self.queue.task_done();
    }

    async fn handle(
        &self,
        message: &InboundMessage,
        context: &ProcessingContext,
    ) -> Result<Processed, ProcessError> {
        let text = message.text().ok_or(ProcessError::EmptyPrompt)?;
        let typing = TypingIndicator::start(self.gateway.clone(), message.chat_id, self.typing_interval);
        let result = self.reply(message, text, context).await;
        typing.stop().await;
        result
    }

    async fn reply(
        &self,
        message: &InboundMessage,
        text: &str,
        context: &ProcessingContext,
    ) -> Result<Processed, ProcessError> {
        let prompt = build_prompt(message, text);
        if prompt.is_empty() {
            return Ok(Processed::NothingToAsk);
        }
        let system_prompt = self.prompts.pick(self.random.as_ref());
        log::debug!("worker: [{}] generating reply", context);
        let reply = self.generator.generate(&prompt, system_prompt).await?;
        self.gateway
            .send_message(
                OutboundMessage::new(message.chat_id, reply)
                    .reply_to(message.message_id)
                    .markdown(),
            )
            .await?;
        Ok(Processed::Replied)
    }

    async fn send_error_reply(&self, message: &InboundMessage, context: &ProcessingContext) {
        let outbound = OutboundMessage::new(message.chat_id, ERROR_REPLY).reply_to(message.message_id);
        if let Err(e) = self.gateway.send_message(outbound).await {
            log::error!(
                "worker: [{}] could not send error reply to chat {}: {}",
                context,
                message.chat_id,
                e
            );
        }
    }
}

/// Prompt for the backend. Replies carry the replied-to text (and its author when
/// known); a leading `@mention` token is removed.
fn build_prompt(message: &InboundMessage, text: &str) -> String {
    let replied = message.reply_to.as_ref().and_then(|r| {
        r.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| (t, r.from.as_ref()))
    });
    let prompt = match replied {
        Some((earlier, author)) => {
            let author = author
                .map(|a| format!(" by {}", a.full_name))
                .unwrap_or_default();
            format!(
                "This message is a reply.\nEarlier message{}: \"\"\"{}\"\"\"\nThe reply: \"\"\"{}\"\"\"",
                author, earlier, text
            )
        }
        None => text.to_string(),
    };
    strip_leading_mention(&prompt)
}

fn strip_leading_mention(prompt: &str) -> String {
    if !prompt.starts_with('@') {
        return prompt.to_string();
    }
    prompt
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim_start().to_string())
        .unwrap_or_default()
}
