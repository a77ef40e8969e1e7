//! Decides, per inbound message, whether it gets a generated reply.

use std::sync::Arc;

use super::context::ProcessingContext;
use super::inflight::{Admit, InFlight};
use super::queue::{ConversationQueue, QueuedItem};
use super::replies::FILLERS;
use crate::channels::{ChatGateway, ChatKind, InboundMessage, OutboundMessage};
use crate::config::ResponseProbabilities;
use crate::random::{self, RandomSource};

/// Why a message was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoText,
    AlreadyInFlight,
    QueueFull,
    NotSelected,
}

/// Outcome of [`AdmissionController::consider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Enqueued,
    FilledWithFiller,
    Dropped(DropReason),
}

/// Probability-gated admission into the conversation queue.
pub struct AdmissionController {
    gateway: Arc<dyn ChatGateway>,
    random: Arc<dyn RandomSource>,
    probabilities: ResponseProbabilities,
    max_queue_size: usize,
    queue: Arc<ConversationQueue>,
    in_flight: Arc<InFlight>,
}

impl AdmissionController {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        random: Arc<dyn RandomSource>,
        probabilities: ResponseProbabilities,
        max_queue_size: usize,
        queue: Arc<ConversationQueue>,
        in_flight: Arc<InFlight>,
    ) -> Self {
        Self {
            gateway,
            random,
            probabilities,
            max_queue_size,
            queue,
            in_flight,
        }
    }

    pub async fn consider(&self, message: InboundMessage, context: ProcessingContext) -> Decision {
        let Some(text) = message.text() else {
            return Decision::Dropped(DropReason::NoText);
        };
        if self.in_flight.contains(message.chat_id) {
            log::debug!(
                "responder: [{}] chat {} already has a message in flight, dropping",
                context,
                message.chat_id
            );
            return Decision::Dropped(DropReason::AlreadyInFlight);
        }

        let probability = if self.is_addressed_to_bot(&message, text, &context).await {
            1.0
        } else {
            self.probabilities.for_kind(message.chat_kind)
        };

        if self.random.sample() < probability {
            return self.enqueue(message, context);
        }
        if message.chat_kind == ChatKind::Private {
            return self.send_filler(&message, &context).await;
        }
        Decision::Dropped(DropReason::NotSelected)
    }

    /// True when the text mentions the bot or the message replies to the bot.
    async fn is_addressed_to_bot(
        &self,
        message: &InboundMessage,
        text: &str,
        context: &ProcessingContext,
    ) -> bool {
        let me = match self.gateway.me().await {
            Ok(me) => me,
            Err(e) => {
                log::warn!("responder: [{}] bot identity unavailable: {}", context, e);
                return false;
            }
        };
        // Usernames are case-insensitive on Telegram.
        let mentioned = me
            .mention()
            .is_some_and(|m| text.to_lowercase().contains(&m.to_lowercase()));
        mentioned || message.replies_to(me.id)
    }

    fn enqueue(&self, message: InboundMessage, context: ProcessingContext) -> Decision {
        match self.in_flight.try_admit(message.chat_id, self.max_queue_size) {
            Admit::Admitted => {
                log::info!(
                    "responder: [{}] queued message {} from chat {}",
                    context,
                    message.message_id,
                    message.chat_id
                );
                self.queue.push(QueuedItem { message, context });
                Decision::Enqueued
            }
            Admit::AlreadyInFlight => {
                log::debug!(
                    "responder: [{}] chat {} was admitted concurrently, dropping",
                    context,
                    message.chat_id
                );
                Decision::Dropped(DropReason::AlreadyInFlight)
            }
            Admit::Full => {
                log::warn!(
                    "responder: [{}] {} conversations in flight (max {}), dropping message from chat {}",
                    context,
                    self.in_flight.len(),
                    self.max_queue_size,
                    message.chat_id
                );
                Decision::Dropped(DropReason::QueueFull)
            }
        }
    }

    async fn send_filler(&self, message: &InboundMessage, context: &ProcessingContext) -> Decision {
        let Some(filler) = random::choose(self.random.as_ref(), FILLERS) else {
            return Decision::Dropped(DropReason::NotSelected);
        };
        let outbound = OutboundMessage::new(message.chat_id, *filler).markdown();
        match self.gateway.send_message(outbound).await {
            Ok(()) => {
                log::debug!("responder: [{}] sent filler to chat {}", context, message.chat_id);
                Decision::FilledWithFiller
            }
            Err(e) => {
                log::warn!(
                    "responder: [{}] failed to send filler to chat {}: {}",
                    context,
                    message.chat_id,
                    e
                );
                Decision::Dropped(DropReason::NotSelected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{RepliedMessage, Sender};
    use crate::testing::{RecordingGateway, ScriptedRandom, BOT_ID};
    use std::sync::atomic::Ordering;

    struct Fixture {
        gateway: Arc<RecordingGateway>,
        queue: Arc<ConversationQueue>,
        in_flight: Arc<InFlight>,
        admission: AdmissionController,
    }

    fn fixture(probabilities: ResponseProbabilities, max: usize, random: ScriptedRandom) -> Fixture {
        let gateway = Arc::new(RecordingGateway::default());
        let queue = Arc::new(ConversationQueue::new());
        let in_flight = Arc::new(InFlight::new());
        let admission = AdmissionController::new(
            gateway.clone(),
            Arc::new(random),
            probabilities,
            max,
            queue.clone(),
            in_flight.clone(),
        );
        Fixture {
            gateway,
            queue,
            in_flight,
            admission,
        }
    }

    fn probabilities(private: f64, group: f64) -> ResponseProbabilities {
        ResponseProbabilities {
            private,
            group,
            supergroup: group,
        }
    }

    fn message(chat_id: i64, kind: ChatKind, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id,
            chat_kind: kind,
            message_id: 100,
            text: Some(text.to_string()),
            reply_to: None,
            from: Some(Sender {
                id: 7,
                full_name: "Ada Lovelace".into(),
                username: None,
            }),
        }
    }

    async fn consider(f: &Fixture, message: InboundMessage) -> Decision {
        f.admission
            .consider(message, ProcessingContext::default())
            .await
    }

    #[tokio::test]
    async fn selected_message_is_enqueued() {
        let f = fixture(probabilities(1.0, 0.0), 10, ScriptedRandom::always(0.5));
        let decision = consider(&f, message(1, ChatKind::Private, "hi")).await;
        assert_eq!(decision, Decision::Enqueued);
        assert!(f.in_flight.contains(1));
        assert_eq!(f.queue.len(), 1);
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_text_is_dropped() {
        let f = fixture(probabilities(1.0, 1.0), 10, ScriptedRandom::always(0.0));
        let mut msg = message(1, ChatKind::Private, "");
        assert_eq!(consider(&f, msg.clone()).await, Decision::Dropped(DropReason::NoText));
        msg.text = None;
        assert_eq!(consider(&f, msg).await, Decision::Dropped(DropReason::NoText));
        assert!(f.queue.is_empty());
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn second_message_from_same_chat_is_dropped() {
        let f = fixture(probabilities(1.0, 1.0), 10, ScriptedRandom::always(0.0));
        assert_eq!(consider(&f, message(1, ChatKind::Group, "one")).await, Decision::Enqueued);
        assert_eq!(
            consider(&f, message(1, ChatKind::Group, "two")).await,
            Decision::Dropped(DropReason::AlreadyInFlight)
        );
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.in_flight.len(), 1);
    }

    #[tokio::test]
    async fn capacity_rejection_leaves_state_untouched() {
        let f = fixture(probabilities(1.0, 1.0), 2, ScriptedRandom::always(0.0));
        assert_eq!(consider(&f, message(1, ChatKind::Group, "a")).await, Decision::Enqueued);
        assert_eq!(consider(&f, message(2, ChatKind::Group, "b")).await, Decision::Enqueued);
        assert_eq!(
            consider(&f, message(3, ChatKind::Group, "c")).await,
            Decision::Dropped(DropReason::QueueFull)
        );
        assert_eq!(f.queue.len(), 2);
        assert_eq!(f.in_flight.len(), 2);
        assert!(!f.in_flight.contains(3));
    }

    #[tokio::test]
    async fn zero_capacity_drops_selected_messages_without_filler() {
        let f = fixture(probabilities(1.0, 1.0), 0, ScriptedRandom::always(0.0));
        assert_eq!(
            consider(&f, message(1, ChatKind::Group, "hey")).await,
            Decision::Dropped(DropReason::QueueFull)
        );
        assert_eq!(
            consider(&f, message(2, ChatKind::Private, "hey")).await,
            Decision::Dropped(DropReason::QueueFull)
        );
        assert!(f.gateway.calls().is_empty());
        assert!(f.in_flight.is_empty());
    }

    #[tokio::test]
    async fn zero_capacity_still_sends_filler_when_not_selected() {
        let f = fixture(probabilities(0.0, 0.0), 0, ScriptedRandom::always(0.9));
        assert_eq!(
            consider(&f, message(2, ChatKind::Private, "hey")).await,
            Decision::FilledWithFiller
        );
        assert_eq!(f.gateway.messages().len(), 1);
    }

    #[tokio::test]
    async fn mention_forces_admission() {
        let f = fixture(probabilities(0.0, 0.0), 10, ScriptedRandom::always(0.999));
        let decision = consider(&f, message(-1, ChatKind::Supergroup, "what do you think @crackbot")).await;
        assert_eq!(decision, Decision::Enqueued);
    }

    #[tokio::test]
    async fn reply_to_bot_forces_admission() {
        let f = fixture(probabilities(0.0, 0.0), 10, ScriptedRandom::always(0.999));
        let mut msg = message(-1, ChatKind::Group, "no way");
        msg.reply_to = Some(RepliedMessage {
            text: None,
            from: Some(Sender {
                id: BOT_ID,
                full_name: "Crack Bot".into(),
                username: Some("crackbot".into()),
            }),
        });
        assert_eq!(consider(&f, msg).await, Decision::Enqueued);
    }

    #[tokio::test]
    async fn reply_to_someone_else_is_not_forced() {
        let f = fixture(probabilities(0.0, 0.0), 10, ScriptedRandom::always(0.5));
        let mut msg = message(-1, ChatKind::Group, "no way");
        msg.reply_to = Some(RepliedMessage {
            text: Some("earlier".into()),
            from: Some(Sender {
                id: 8,
                full_name: "Bob".into(),
                username: None,
            }),
        });
        assert_eq!(consider(&f, msg).await, Decision::Dropped(DropReason::NotSelected));
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn unselected_private_message_gets_one_filler() {
        let f = fixture(
            probabilities(0.2, 0.0),
            10,
            ScriptedRandom::new(vec![0.5], vec![3]),
        );
        assert_eq!(
            consider(&f, message(5, ChatKind::Private, "hello")).await,
            Decision::FilledWithFiller
        );
        let sent = f.gateway.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 5);
        assert_eq!(sent[0].text, FILLERS[3]);
        assert!(f.queue.is_empty());
        assert!(f.in_flight.is_empty());
    }

    #[tokio::test]
    async fn unselected_group_message_is_dropped_silently() {
        let f = fixture(probabilities(1.0, 0.01), 10, ScriptedRandom::always(0.5));
        assert_eq!(
            consider(&f, message(-5, ChatKind::Group, "hello all")).await,
            Decision::Dropped(DropReason::NotSelected)
        );
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn channel_posts_never_respond() {
        let f = fixture(probabilities(1.0, 1.0), 10, ScriptedRandom::always(0.0));
        assert_eq!(
            consider(&f, message(-9, ChatKind::Other, "broadcast")).await,
            Decision::Dropped(DropReason::NotSelected)
        );
    }

    #[tokio::test]
    async fn identity_failure_falls_back_to_table() {
        let f = fixture(probabilities(1.0, 0.0), 10, ScriptedRandom::always(0.5));
        f.gateway.fail_me.store(true, Ordering::SeqCst);
        assert_eq!(
            consider(&f, message(-1, ChatKind::Group, "@crackbot hi")).await,
            Decision::Dropped(DropReason::NotSelected)
        );
        assert_eq!(consider(&f, message(1, ChatKind::Private, "hi")).await, Decision::Enqueued);
    }

    #[tokio::test]
    async fn failed_filler_send_is_reported_as_drop() {
        let f = fixture(probabilities(0.0, 0.0), 10, ScriptedRandom::always(0.5));
        f.gateway.fail_messages.store(true, Ordering::SeqCst);
        assert_eq!(
            consider(&f, message(1, ChatKind::Private, "hi")).await,
            Decision::Dropped(DropReason::NotSelected)
        );
    }

    #[tokio::test]
    async fn mention_match_ignores_case() {
        let f = fixture(probabilities(0.0, 0.0), 10, ScriptedRandom::always(0.999));
        let decision = consider(&f, message(-1, ChatKind::Group, "hey @CrackBot, thoughts?")).await;
        assert_eq!(decision, Decision::Enqueued);
    }

    fn shared_fixture(max: usize) -> (Arc<AdmissionController>, Arc<ConversationQueue>, Arc<InFlight>) {
        let f = fixture(probabilities(1.0, 1.0), max, ScriptedRandom::always(0.0));
        (Arc::new(f.admission), f.queue, f.in_flight)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_messages_for_one_chat_admit_exactly_one() {
        let (admission, queue, in_flight) = shared_fixture(10);
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let admission = admission.clone();
                tokio::spawn(async move {
                    admission
                        .consider(message(1, ChatKind::Group, &format!("msg {i}")), ProcessingContext::default())
                        .await
                })
            })
            .collect();
        let mut enqueued = 0;
        for task in tasks {
            match task.await.expect("task joined") {
                Decision::Enqueued => enqueued += 1,
                Decision::Dropped(DropReason::AlreadyInFlight) => {}
                other => panic!("unexpected decision: {other:?}"),
            }
        }
        assert_eq!(enqueued, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(in_flight.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_messages_for_many_chats_respect_capacity() {
        let (admission, queue, in_flight) = shared_fixture(5);
        let tasks: Vec<_> = (0..64)
            .map(|chat| {
                let admission = admission.clone();
                tokio::spawn(async move {
                    admission
                        .consider(message(chat, ChatKind::Group, "hello"), ProcessingContext::default())
                        .await
                })
            })
            .collect();
        let mut enqueued = 0;
        for task in tasks {
            match task.await.expect("task joined") {
                Decision::Enqueued => enqueued += 1,
                Decision::Dropped(DropReason::QueueFull) => {}
                other => panic!("unexpected decision: {other:?}"),
            }
        }
        assert_eq!(enqueued, 5);
        assert_eq!(queue.len(), 5);
        assert_eq!(in_flight.len(), 5);
    }
}
