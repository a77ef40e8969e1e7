//! Message admission and processing: who gets an answer, and the worker that writes it.
//!
//! Inbound messages go through [`AdmissionController::consider`]. Selected messages are
//! pushed onto the [`ConversationQueue`] and their conversation is marked in [`InFlight`]
//! until the single [`MessageWorker`] has finished with them.

mod admission;
mod context;
mod inflight;
mod queue;
pub mod replies;
mod typing;
mod worker;

pub use admission::{AdmissionController, Decision, DropReason};
pub use context::ProcessingContext;
pub use inflight::{Admit, InFlight};
pub use queue::{ConversationQueue, QueuedItem};
pub use typing::TypingIndicator;
pub use worker::{MessageWorker, ProcessError};
