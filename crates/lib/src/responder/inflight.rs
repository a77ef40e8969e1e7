//! Conversations that currently have a message queued or being processed.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of [`InFlight::try_admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    Admitted,
    AlreadyInFlight,
    /// The set already holds `capacity` conversations.
    Full,
}

/// Set of conversation ids with exactly one item in flight.
///
/// Inserted by admission, removed only by the worker once the item is finished.
#[derive(Debug, Default)]
pub struct InFlight {
    chats: Mutex<HashSet<i64>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn chats(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, chat_id: i64) -> bool {
        self.chats().contains(&chat_id)
    }

    /// Insert `chat_id` unless it is already present or the set is at `capacity`.
    /// Check and insert happen under one lock, and a rejection leaves the set unchanged.
    pub fn try_admit(&self, chat_id: i64, capacity: usize) -> Admit {
        let mut chats = self.chats();
        if chats.contains(&chat_id) {
            return Admit::AlreadyInFlight;
        }
        if chats.len() >= capacity {
            return Admit::Full;
        }
        chats.insert(chat_id);
        Admit::Admitted
    }

    /// Remove `chat_id`. Returns false if it was not present.
    pub fn release(&self, chat_id: i64) -> bool {
        self.chats().remove(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.chats().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats().is_empty()
    }
}
