//! Core domain types for chatsync
//!
//! These types mirror the backend's wire format for conversations, messages
//! and documents, plus the client-side derived state the sync engine works
//! with.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Conversation** | A chat thread; exactly one is active in a session |
//! | **Message** | One turn in a conversation, from the user, the assistant or the system |
//! | **Document** | An uploaded file attached to a conversation for grounding |
//! | **Marker** | The backend's free-form `content_snippet`, which doubles as processing status |
//! | **Temporary id** | A client-generated message id used until the server acknowledges the send |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation identifiers are opaque server-issued strings (UUIDs in practice).
pub type ConversationId = String;

/// Message identifiers are server-issued, or client-temporary before acknowledgment.
pub type MessageId = String;

/// Document identifiers are server-issued.
pub type DocumentId = String;

/// Prefix of client-generated message ids.
pub const TEMP_ID_PREFIX: &str = "temp-";

// ============================================
// Messages
// ============================================

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Returns the identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            _ => Err(format!("unknown message role: {}", s)),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-issued id, or a `temp-` id while the send is in flight
    pub id: MessageId,
    /// Owning conversation
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Citations, token usage and similar backend extras
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Message {
    /// Synthesize an optimistic user message with a fresh temporary id.
    pub fn optimistic(conversation_id: &str, content: &str) -> Self {
        Self {
            id: format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4()),
            conversation_id: conversation_id.to_string(),
            role: MessageRole::User,
            content: content.to_string(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Whether this message still carries a client-generated id.
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

// ============================================
// Documents
// ============================================

/// Marker the backend writes on upload, before ingestion finishes.
pub const PROCESSING_MARKER: &str = "Processing...";

/// Prefix the backend writes once ingestion has finished.
pub const PROCESSED_PREFIX: &str = "Processed";

/// Derived lifecycle state of a document.
///
/// Never stored; always computed from the marker and embedding presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Processing,
    Ready,
}

impl DocumentState {
    /// Translate the backend's marker convention into a lifecycle state.
    ///
    /// This is the only place that knows about the marker strings. A
    /// document with no marker and no embedding has not been touched by
    /// the ingestion pipeline yet and counts as `Processing`.
    pub fn derive(marker: Option<&str>, has_embedding: bool) -> Self {
        match marker {
            Some(PROCESSING_MARKER) => DocumentState::Processing,
            Some(m) if m.starts_with(PROCESSED_PREFIX) => DocumentState::Ready,
            Some(_) if has_embedding => DocumentState::Ready,
            Some(_) => DocumentState::Processing,
            None if has_embedding => DocumentState::Ready,
            None => DocumentState::Processing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Processing => "processing",
            DocumentState::Ready => "ready",
        }
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded document as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Null until the document is attached to a conversation
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub filename: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Processing marker (`content_snippet` on the wire)
    #[serde(default, rename = "content_snippet")]
    pub marker: Option<String>,
    /// Embedding vector; only its presence is meaningful here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Current derived lifecycle state.
    pub fn state(&self) -> DocumentState {
        DocumentState::derive(self.marker.as_deref(), self.has_embedding())
    }

    pub fn is_ready(&self) -> bool {
        self.state() == DocumentState::Ready
    }
}

// ============================================
// Conversations
// ============================================

/// Lightweight conversation view, as listed in a sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full conversation view including messages.
///
/// The backend loads documents separately; `documents` is empty unless the
/// caller filled it from `list documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl ConversationDetail {
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A file the user wants to attach.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &std::path::Path) -> crate::error::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self { filename, bytes })
    }
}
