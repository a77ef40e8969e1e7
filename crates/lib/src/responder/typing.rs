//! Periodic "typing" action while a reply is being generated.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channels::ChatGateway;

/// Background task that sends a typing action to one chat every `interval` until stopped.
///
/// Dropping the indicator also cancels the task, so it never outlives its owner.
pub struct TypingIndicator {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    pub fn start(gateway: Arc<dyn ChatGateway>, chat_id: i64, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(send_periodically(gateway, chat_id, interval, cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Signal the task and wait until it has exited.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    log::warn!("typing: indicator task panicked");
                }
            }
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn send_periodically(
    gateway: Arc<dyn ChatGateway>,
    chat_id: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = gateway.send_typing(chat_id) => {
                if let Err(e) = sent {
                    log::warn!("typing: failed to send typing action to chat {}: {}", chat_id, e);
                }
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
