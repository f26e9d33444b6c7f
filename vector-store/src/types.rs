//! Identifiers, collaborator records, stored rows and search hits.

use std::fmt;

use chrono::{DateTime, Utc};
use semctx_embeddings::EmbeddingVector;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub type MessageId = i64;
pub type ConversationId = i64;
pub type FileId = i64;
pub type UserId = i64;
pub type ProjectId = i64;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted chat message, as supplied by the conversation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A conversation and its ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub user_id: UserId,
    pub project_id: Option<ProjectId>,
    pub title: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Active,
    Processing,
    Failed,
    Deleted,
}

/// An uploaded file and its ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub user_id: UserId,
    pub project_id: Option<ProjectId>,
    pub name: String,
    pub mime_type: String,
    pub status: FileStatus,
}

/// Embedding of a single message. Insert-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEmbedding {
    pub message_id: MessageId,
    pub vector: EmbeddingVector,
    pub created_at: DateTime<Utc>,
}

/// The live embedding of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEmbedding {
    pub conversation_id: ConversationId,
    pub summary: String,
    pub vector: EmbeddingVector,
    pub updated_at: DateTime<Utc>,
}

/// One embedded window of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChunk {
    pub file_id: FileId,
    pub chunk_index: usize,
    pub text: String,
    pub vector: EmbeddingVector,
}

/// Who a search runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchScope {
    user_id: UserId,
    project_id: Option<ProjectId>,
}

impl SearchScope {
    /// Build a scope. Non-positive user ids are treated as missing.
    pub fn new(user_id: UserId, project_id: Option<ProjectId>) -> Result<Self> {
        if user_id <= 0 {
            return Err(StoreError::MissingUser(user_id));
        }
        Ok(Self {
            user_id,
            project_id,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// Whether a record owned by `user_id` in `project_id` is visible.
    pub fn admits(&self, user_id: UserId, project_id: Option<ProjectId>) -> bool {
        user_id == self.user_id && self.project_id.is_none_or(|p| project_id == Some(p))
    }
}

/// A message similar to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMessage {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub conversation_id: ConversationId,
    pub similarity: f32,
    pub created_at: DateTime<Utc>,
}

/// A conversation similar to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarConversation {
    pub id: ConversationId,
    pub title: String,
    pub summary: String,
    pub similarity: f32,
    pub created_at: DateTime<Utc>,
}

/// A file chunk relevant to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileChunkMatch {
    pub file_id: FileId,
    pub file_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub similarity: f32,
}

impl FileChunkMatch {
    /// Identity of the chunk across searches.
    pub fn key(&self) -> (FileId, usize) {
        (self.file_id, self.chunk_index)
    }
}
