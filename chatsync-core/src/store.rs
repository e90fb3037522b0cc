//! Conversation store: the single in-memory view of the active conversation.
//!
//! Messages keep insertion order and are unique by id. Documents are unique
//! by id with last-writer-wins replacement; their order carries no meaning.

use crate::types::{ConversationDetail, ConversationId, Document, Message};
use std::collections::HashSet;

/// Holds the active conversation's messages and documents.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversation_id: Option<ConversationId>,
    title: Option<String>,
    messages: Vec<Message>,
    message_ids: HashSet<String>,
    documents: Vec<Document>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole view with a fresh snapshot.
    pub fn load(&mut self, detail: ConversationDetail) {
        self.clear();
        self.conversation_id = Some(detail.id);
        self.title = detail.title;
        for message in detail.messages {
            self.append_message(message);
        }
        self.upsert_documents(detail.documents);
    }

    /// Empty the view (conversation switch or teardown).
    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.title = None;
        self.messages.clear();
        self.message_ids.clear();
        self.documents.clear();
    }

    /// Append a message unless one with the same id is already present.
    ///
    /// Returns whether an insertion happened.
    pub fn append_message(&mut self, message: Message) -> bool {
        if !self.message_ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Remove a message by id, returning it if it was present.
    pub fn remove_message(&mut self, id: &str) -> Option<Message> {
        if !self.message_ids.remove(id) {
            return None;
        }
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    /// Swap the message `old_id` for `message`, keeping its position.
    ///
    /// If `message.id` is already present the old message is only removed.
    /// Returns whether `message` was inserted.
    pub fn replace_message(&mut self, old_id: &str, message: Message) -> bool {
        if self.message_ids.contains(&message.id) {
            self.remove_message(old_id);
            return false;
        }
        let Some(idx) = self.messages.iter().position(|m| m.id == old_id) else {
            return self.append_message(message);
        };
        self.message_ids.remove(old_id);
        self.message_ids.insert(message.id.clone());
        self.messages[idx] = message;
        true
    }

    /// Merge a batch of documents; a later copy of an id replaces the earlier one.
    pub fn upsert_documents(&mut self, docs: impl IntoIterator<Item = Document>) {
        for doc in docs {
            match self.documents.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc,
                None => self.documents.push(doc),
            }
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Whether `id` is the conversation this store currently represents.
    pub fn is_active(&self, id: &str) -> bool {
        self.conversation_id.as_deref() == Some(id)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn contains_message(&self, id: &str) -> bool {
        self.message_ids.contains(id)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }
}
