//! Fakes for the gateway, backend, and random seams (unit tests only).

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::channels::{BotIdentity, ChannelError, ChatGateway, OutboundMessage, SetWebhook};
use crate::llm::{LlmError, TextGenerator};
use crate::random::RandomSource;

pub const BOT_ID: i64 = 42;
pub const BOT_USERNAME: &str = "crackbot";

/// Draws come from the scripted lists; once exhausted, samples are 0.0 and indices 0.
pub struct ScriptedRandom {
    samples: Mutex<VecDeque<f64>>,
    indices: Mutex<VecDeque<usize>>,
}

impl ScriptedRandom {
    pub fn new(samples: Vec<f64>, indices: Vec<usize>) -> Self {
        Self {
            samples: Mutex::new(samples.into()),
            indices: Mutex::new(indices.into()),
        }
    }

    /// Every sample returns `value`.
    pub fn always(value: f64) -> Self {
        Self::new(vec![value; 64], Vec::new())
    }
}

impl RandomSource for ScriptedRandom {
    fn sample(&self) -> f64 {
        self.samples
            .lock()
            .expect("samples lock")
            .pop_front()
            .unwrap_or(0.0)
    }

    fn index(&self, len: usize) -> usize {
        self.indices
            .lock()
            .expect("indices lock")
            .pop_front()
            .unwrap_or(0)
            % len
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Message(OutboundMessage),
    Sticker { chat_id: i64, sticker: String },
    Typing(i64),
    SetWebhook(SetWebhook),
    DeleteWebhook,
}

fn api_error(method: &'static str) -> ChannelError {
    ChannelError::Api {
        method,
        description: "scripted failure".to_string(),
    }
}

/// Records every call. Failures are switched on per operation.
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    pub fail_messages: AtomicBool,
    pub fail_typing: AtomicBool,
    pub fail_me: AtomicBool,
    /// Scripted setWebhook results: `Some(bool)` is an API answer, `None` a transport error.
    set_webhook_results: Mutex<VecDeque<Option<bool>>>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_messages: AtomicBool::new(false),
            fail_typing: AtomicBool::new(false),
            fail_me: AtomicBool::new(false),
            set_webhook_results: Mutex::new(VecDeque::new()),
        }
    }
}

impl RecordingGateway {
    pub fn with_set_webhook_results(results: Vec<Option<bool>>) -> Self {
        let gateway = Self::default();
        *gateway.set_webhook_results.lock().expect("results lock") = results.into();
        gateway
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Typing(_)))
            .count()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(&self, message: OutboundMessage) -> Result<(), ChannelError> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(api_error("sendMessage"));
        }
        self.record(GatewayCall::Message(message));
        Ok(())
    }

    async fn send_sticker(&self, chat_id: i64, sticker: &str) -> Result<(), ChannelError> {
        self.record(GatewayCall::Sticker {
            chat_id,
            sticker: sticker.to_string(),
        });
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), ChannelError> {
        self.record(GatewayCall::Typing(chat_id));
        if self.fail_typing.load(Ordering::SeqCst) {
            return Err(api_error("sendChatAction"));
        }
        Ok(())
    }

    async fn me(&self) -> Result<BotIdentity, ChannelError> {
        if self.fail_me.load(Ordering::SeqCst) {
            return Err(api_error("getMe"));
        }
        Ok(BotIdentity {
            id: BOT_ID,
            username: Some(BOT_USERNAME.to_string()),
        })
    }

    async fn set_webhook(&self, request: &SetWebhook) -> Result<bool, ChannelError> {
        self.record(GatewayCall::SetWebhook(request.clone()));
        let next = self
            .set_webhook_results
            .lock()
            .expect("results lock")
            .pop_front()
            .unwrap_or(Some(true));
        next.ok_or_else(|| api_error("setWebhook"))
    }

    async fn delete_webhook(&self) -> Result<bool, ChannelError> {
        self.record(GatewayCall::DeleteWebhook);
        Ok(true)
    }
}

/// Answers with scripted results in order; `Err` entries become API errors.
/// Once exhausted, echoes the prompt back.
#[derive(Default)]
pub struct ScriptedGenerator {
    results: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(results: Vec<Result<String, String>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    /// Sleep this long before answering (use with a paused clock).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(prompt, system_prompt)` pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((prompt.to_string(), system_prompt.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.results.lock().expect("results lock").pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(LlmError::Api(e)),
            None => Ok(prompt.to_string()),
        }
    }
}
