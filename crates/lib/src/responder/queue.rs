//! FIFO of admitted messages with a single consumer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};

use super::context::ProcessingContext;
use crate::channels::InboundMessage;

/// An admitted message plus the correlation data captured at admission.
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub message: InboundMessage,
    pub context: ProcessingContext,
}

/// Unbounded FIFO; capacity is enforced by the admission controller before `push`.
///
/// Counts unfinished items like a join-able work queue: `push` increments,
/// `task_done` decrements and `join` waits for zero.
pub struct ConversationQueue {
    items: Mutex<VecDeque<QueuedItem>>,
    available: Notify,
    unfinished: watch::Sender<usize>,
}

impl Default for ConversationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationQueue {
    pub fn new() -> Self {
        let (unfinished, _) = watch::channel(0);
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            unfinished,
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<QueuedItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item. Never blocks and never rejects.
    pub fn push(&self, item: QueuedItem) {
        self.items().push_back(item);
        self.unfinished.send_modify(|n| *n += 1);
        self.available.notify_one();
    }

    /// Wait for the oldest item. Each item is handed to exactly one caller.
    pub async fn pop(&self) -> QueuedItem {
        loop {
            let notified = self.available.notified();
            if let Some(item) = self.items().pop_front() {
                return item;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Items pushed but not yet marked done (queued plus being processed).
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    /// Mark one popped item as fully processed.
    pub fn task_done(&self) {
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Wait until every pushed item has been marked done.
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
