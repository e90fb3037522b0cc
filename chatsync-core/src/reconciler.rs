//! Message reconciliation across optimistic inserts, send acknowledgments
//! and push deliveries.
//!
//! ## The three producers
//!
//! ```text
//!  user send ──► optimistic (temp id) ──┐
//!  send response (server id) ───────────┼──► ConversationStore::append_message
//!  push `new_message` (non-user roles) ─┘
//! ```
//!
//! Every path goes through the store's id check, so any interleaving
//! converges to the same sequence. A push with role `user` is not folded
//! into the store: the sender's own messages are owned by the
//! optimistic-then-acknowledged path. The channel still delivers the event
//! to every handler; only this fold-in ignores it.
//!
//! The backend answers a send with the assistant's reply rather than the
//! stored user message. A non-user acknowledgment is folded in like a push
//! and the temporary message stays pending until a re-fetch returns the
//! server copy, which then takes the temporary message's place. If that
//! copy never shows up, [`MessageReconciler::abandon_unsettled`] drops the
//! temporary messages so the store does not keep them forever.

use crate::store::ConversationStore;
use crate::types::{ConversationId, Message, MessageId, MessageRole};
use std::collections::HashMap;

#[derive(Debug)]
struct PendingSend {
    conversation_id: ConversationId,
    /// Answered with a reply; waiting for the stored user copy
    acknowledged: bool,
}

/// What happened to a pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    /// Already present under the same id
    Duplicate,
    /// Role `user`; the send path owns these
    SuppressedOwnMessage,
    /// Belongs to a conversation other than the active one
    OtherConversation,
}

/// What happened when a send was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Temporary message swapped for the server copy
    Replaced,
    /// The server copy was already present; only the temp id was cleaned up
    AlreadyDelivered,
    /// The response was the assistant's reply; the temporary message stays
    /// pending until a re-fetch delivers the server copy
    AwaitingServerCopy,
    /// The temporary message was not pending (already acknowledged or rolled back)
    Unknown,
}

/// Tracks in-flight sends and applies the reconciliation rules to a store.
#[derive(Debug, Default)]
pub struct MessageReconciler {
    /// temp id → send state
    pending: HashMap<MessageId, PendingSend>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an optimistic user message into the active conversation.
    ///
    /// Returns the optimistic message, or `None` when no conversation is
    /// active. This is the only insertion that precedes a network call.
    pub fn begin_send(
        &mut self,
        store: &mut ConversationStore,
        content: &str,
    ) -> Option<Message> {
        let conversation_id = store.conversation_id()?.to_string();
        let message = Message::optimistic(&conversation_id, content);
        store.append_message(message.clone());
        self.pending.insert(
            message.id.clone(),
            PendingSend {
                conversation_id,
                acknowledged: false,
            },
        );
        tracing::debug!(
            conversation_id = %message.conversation_id,
            temp_id = %message.id,
            "Optimistic message inserted"
        );
        Some(message)
    }

    /// Apply the response to a send.
    ///
    /// A `user` response replaces the temporary message in place. Any other
    /// role is the backend's reply and is appended without settling the send.
    pub fn acknowledge(
        &mut self,
        store: &mut ConversationStore,
        temp_id: &str,
        response: Message,
    ) -> AckOutcome {
        let Some(send) = self.pending.get_mut(temp_id) else {
            if response.role != MessageRole::User {
                store.append_message(response);
            }
            return AckOutcome::Unknown;
        };

        if response.role != MessageRole::User {
            send.acknowledged = true;
            tracing::debug!(
                temp_id = %temp_id,
                message_id = %response.id,
                role = %response.role,
                "Send answered with reply; awaiting server copy"
            );
            store.append_message(response);
            return AckOutcome::AwaitingServerCopy;
        }

        self.pending.remove(temp_id);
        let message_id = response.id.clone();
        if store.replace_message(temp_id, response) {
            tracing::debug!(temp_id = %temp_id, message_id = %message_id, "Send acknowledged");
            AckOutcome::Replaced
        } else {
            tracing::debug!(
                temp_id = %temp_id,
                message_id = %message_id,
                "Send acknowledged after server copy arrived; temp id cleaned up"
            );
            AckOutcome::AlreadyDelivered
        }
    }

    /// Fold a fetched message list into the store.
    ///
    /// A fetched `user` message whose content matches a pending temporary
    /// message settles the oldest such send in place. Everything else is
    /// appended if its id is new. Returns the number of messages added or
    /// settled.
    pub fn merge_fetched(
        &mut self,
        store: &mut ConversationStore,
        messages: Vec<Message>,
    ) -> usize {
        let mut changed = 0;
        for message in messages {
            if !store.is_active(&message.conversation_id) || store.contains_message(&message.id) {
                continue;
            }
            let settles = (message.role == MessageRole::User)
                .then(|| self.oldest_pending_with(store, &message.content))
                .flatten();
            match settles {
                Some(temp_id) => {
                    self.pending.remove(&temp_id);
                    tracing::debug!(
                        temp_id = %temp_id,
                        message_id = %message.id,
                        "Send settled by re-fetch"
                    );
                    store.replace_message(&temp_id, message);
                    changed += 1;
                }
                None => {
                    if store.append_message(message) {
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    fn oldest_pending_with(&self, store: &ConversationStore, content: &str) -> Option<MessageId> {
        store
            .messages()
            .iter()
            .find(|m| {
                m.is_temporary() && m.content == content && self.pending.contains_key(&m.id)
            })
            .map(|m| m.id.clone())
    }

    /// Undo an optimistic insert after the send failed.
    ///
    /// Returns whether a pending message was removed.
    pub fn rollback(&mut self, store: &mut ConversationStore, temp_id: &str) -> bool {
        if self.pending.remove(temp_id).is_none() {
            return false;
        }
        store.remove_message(temp_id).is_some()
    }

    /// Fold a pushed message into the store.
    pub fn apply_push(&self, store: &mut ConversationStore, message: Message) -> PushOutcome {
        if !store.is_active(&message.conversation_id) {
            return PushOutcome::OtherConversation;
        }
        if message.role == MessageRole::User {
            tracing::debug!(
                conversation_id = %message.conversation_id,
                message_id = %message.id,
                "Ignoring pushed user message; send path is authoritative"
            );
            return PushOutcome::SuppressedOwnMessage;
        }
        if store.append_message(message) {
            PushOutcome::Appended
        } else {
            PushOutcome::Duplicate
        }
    }

    /// Give up on sends that were answered but whose server copy never
    /// arrived: their temporary messages leave the store.
    ///
    /// Returns the temporary ids that were dropped.
    pub fn abandon_unsettled(&mut self, store: &mut ConversationStore) -> Vec<MessageId> {
        let abandoned: Vec<MessageId> = self
            .pending
            .iter()
            .filter(|(_, send)| send.acknowledged)
            .map(|(id, _)| id.clone())
            .collect();
        for temp_id in &abandoned {
            if let Some(send) = self.pending.remove(temp_id) {
                tracing::warn!(
                    conversation_id = %send.conversation_id,
                    temp_id = %temp_id,
                    "Server copy never arrived; dropping temporary message"
                );
            }
            store.remove_message(temp_id);
        }
        abandoned
    }

    /// Number of sends not yet settled, answered or not.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether some answered send still waits for its server copy.
    pub fn has_unsettled(&self) -> bool {
        self.pending.values().any(|send| send.acknowledged)
    }

    pub fn is_pending(&self, temp_id: &str) -> bool {
        self.pending.contains_key(temp_id)
    }

    /// Forget in-flight sends (conversation switch). Late responses for
    /// them are then reported as `Unknown` and leave the store untouched.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationDetail;
    use chrono::Utc;

    fn active_store() -> ConversationStore {
        let mut store = ConversationStore::new();
        store.load(ConversationDetail {
            id: "c1".to_string(),
            title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: vec![],
            documents: vec![],
        });
        store
    }

    fn server_message(id: &str, role: MessageRole, content: &str) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    #[test]
    fn test_optimistic_then_ack() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();

        let temp = reconciler.begin_send(&mut store, "hi").unwrap();
        assert_eq!(store.messages().len(), 1);
        assert!(store.messages()[0].is_temporary());

        let outcome = reconciler.acknowledge(
            &mut store,
            &temp.id,
            server_message("m1", MessageRole::User, "hi"),
        );
        assert_eq!(outcome, AckOutcome::Replaced);

        let users: Vec<_> = store
            .messages()
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "m1");
        assert_eq!(reconciler.pending_count(), 0);
    }

    #[test]
    fn test_ack_after_assistant_push_keeps_single_copy() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();
        let temp = reconciler.begin_send(&mut store, "hi").unwrap();

        // A refresh raced ahead and already delivered the server copy
        store.append_message(server_message("m1", MessageRole::User, "hi"));

        let outcome = reconciler.acknowledge(
            &mut store,
            &temp.id,
            server_message("m1", MessageRole::User, "hi"),
        );
        assert_eq!(outcome, AckOutcome::AlreadyDelivered);
        assert_eq!(store.messages().len(), 1);
        assert!(!store.contains_message(&temp.id));
    }

    #[test]
    fn test_reply_ack_waits_for_server_copy() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();
        let temp = reconciler.begin_send(&mut store, "hi").unwrap();

        let outcome = reconciler.acknowledge(
            &mut store,
            &temp.id,
            server_message("a1", MessageRole::Assistant, "hello"),
        );
        assert_eq!(outcome, AckOutcome::AwaitingServerCopy);
        assert!(reconciler.is_pending(&temp.id));

        let changed = reconciler.merge_fetched(
            &mut store,
            vec![
                server_message("u1", MessageRole::User, "hi"),
                server_message("a1", MessageRole::Assistant, "hello"),
            ],
        );
        assert_eq!(changed, 1);
        assert_eq!(reconciler.pending_count(), 0);
        let ids: Vec<_> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "a1"]);
    }

    #[test]
    fn test_abandon_drops_only_answered_sends() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();
        let answered = reconciler.begin_send(&mut store, "hi").unwrap();
        let in_flight = reconciler.begin_send(&mut store, "still going").unwrap();
        assert!(!reconciler.has_unsettled());

        reconciler.acknowledge(
            &mut store,
            &answered.id,
            server_message("a1", MessageRole::Assistant, "hello"),
        );
        assert!(reconciler.has_unsettled());

        let dropped = reconciler.abandon_unsettled(&mut store);
        assert_eq!(dropped, vec![answered.id.clone()]);
        assert!(!reconciler.has_unsettled());
        assert!(!store.contains_message(&answered.id));
        assert!(store.contains_message("a1"));
        assert!(reconciler.is_pending(&in_flight.id));
        assert!(store.contains_message(&in_flight.id));
    }

    #[test]
    fn test_merge_fetched_is_idempotent() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();
        let fetched = vec![
            server_message("u1", MessageRole::User, "hi"),
            server_message("a1", MessageRole::Assistant, "hello"),
        ];
        assert_eq!(reconciler.merge_fetched(&mut store, fetched.clone()), 2);
        assert_eq!(reconciler.merge_fetched(&mut store, fetched), 0);
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn test_rollback_removes_temp() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();
        let temp = reconciler.begin_send(&mut store, "hi").unwrap();

        assert!(reconciler.rollback(&mut store, &temp.id));
        assert!(store.messages().is_empty());
        assert!(!reconciler.rollback(&mut store, &temp.id));
    }

    #[test]
    fn test_begin_send_without_active_conversation() {
        let mut store = ConversationStore::new();
        let mut reconciler = MessageReconciler::new();
        assert!(reconciler.begin_send(&mut store, "hi").is_none());
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_push_user_message_is_suppressed() {
        let mut store = active_store();
        let reconciler = MessageReconciler::new();
        let outcome =
            reconciler.apply_push(&mut store, server_message("m9", MessageRole::User, "echo"));
        assert_eq!(outcome, PushOutcome::SuppressedOwnMessage);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_push_assistant_message_is_appended_once() {
        let mut store = active_store();
        let reconciler = MessageReconciler::new();
        let msg = server_message("a1", MessageRole::Assistant, "answer");
        assert_eq!(reconciler.apply_push(&mut store, msg.clone()), PushOutcome::Appended);
        assert_eq!(reconciler.apply_push(&mut store, msg), PushOutcome::Duplicate);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_push_for_other_conversation() {
        let mut store = active_store();
        let reconciler = MessageReconciler::new();
        let mut msg = server_message("a1", MessageRole::Assistant, "elsewhere");
        msg.conversation_id = "c2".to_string();
        assert_eq!(reconciler.apply_push(&mut store, msg), PushOutcome::OtherConversation);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_ack_after_reset_is_unknown() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();
        let temp = reconciler.begin_send(&mut store, "hi").unwrap();
        reconciler.reset();
        let outcome = reconciler.acknowledge(
            &mut store,
            &temp.id,
            server_message("m1", MessageRole::User, "hi"),
        );
        assert_eq!(outcome, AckOutcome::Unknown);
    }

    #[test]
    fn test_mixed_sources_never_duplicate() {
        let mut store = active_store();
        let mut reconciler = MessageReconciler::new();

        let t1 = reconciler.begin_send(&mut store, "one").unwrap();
        let reply = server_message("a1", MessageRole::Assistant, "reply");
        reconciler.apply_push(&mut store, reply.clone());
        let t2 = reconciler.begin_send(&mut store, "two").unwrap();
        reconciler.acknowledge(&mut store, &t2.id, server_message("u2", MessageRole::User, "two"));
        reconciler.apply_push(&mut store, reply);
        reconciler.apply_push(&mut store, server_message("u1", MessageRole::User, "one"));
        reconciler.acknowledge(&mut store, &t1.id, server_message("u1", MessageRole::User, "one"));
        reconciler.acknowledge(&mut store, &t1.id, server_message("u1", MessageRole::User, "one"));

        let mut ids: Vec<_> = store.messages().iter().map(|m| m.id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(ids, vec!["a1", "u1", "u2"]);
    }
}
