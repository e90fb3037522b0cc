//! External conversation API.
//!
//! [`ConversationApi`] is the request/response surface the sync engine talks
//! to. [`HttpApi`] implements it against the backend's REST endpoints; tests
//! substitute an in-memory implementation.

mod http;

pub use http::HttpApi;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ConversationDetail, ConversationSummary, Document, DocumentId, Message, UploadFile,
};

/// Request/response operations of the conversation backend.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Create a conversation whose first message is `first_message`.
    async fn create_conversation(
        &self,
        first_message: &str,
        doc_ids: &[DocumentId],
    ) -> Result<ConversationDetail>;

    /// List conversations, most recently updated first.
    async fn list_conversations(&self, skip: usize, limit: usize)
        -> Result<Vec<ConversationSummary>>;

    /// Fetch a conversation with its messages. Documents are listed separately.
    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail>;

    /// Post a user message, optionally grounded against `doc_ids`.
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        doc_ids: &[DocumentId],
    ) -> Result<Message>;

    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Upload a file into a conversation. The returned record is still processing.
    async fn upload_document(&self, conversation_id: &str, file: &UploadFile) -> Result<Document>;

    async fn list_documents(&self, conversation_id: &str) -> Result<Vec<Document>>;

    /// Whether the backend answers its health probe.
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

/// A full re-fetch of one conversation: its detail plus its document list.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub conversation: ConversationDetail,
    pub documents: Vec<Document>,
}

impl ConversationSnapshot {
    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }

    /// Fold the document list into the detail, listed documents last so
    /// they win over any embedded copies.
    pub fn into_detail(self) -> ConversationDetail {
        let mut detail = self.conversation;
        detail.documents.extend(self.documents);
        detail
    }
}

/// Fetch a conversation and its documents.
pub async fn fetch_snapshot(
    api: &dyn ConversationApi,
    conversation_id: &str,
) -> Result<ConversationSnapshot> {
    let conversation = api.get_conversation(conversation_id).await?;
    let documents = api.list_documents(conversation_id).await?;
    tracing::debug!(
        conversation_id = %conversation_id,
        messages = conversation.messages.len(),
        documents = documents.len(),
        "Fetched conversation snapshot"
    );
    Ok(ConversationSnapshot {
        conversation,
        documents,
    })
}
