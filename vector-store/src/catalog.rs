//! Read access to conversation, message and file records.
//!
//! The engine never writes these records; they belong to the application's
//! own stores. [`ConversationCatalog`] is the seam those stores plug into.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{
    ConversationId, ConversationRecord, FileId, FileRecord, MessageId, MessageRecord,
};

/// Lookup of the records that own embeddings.
#[async_trait]
pub trait ConversationCatalog: Send + Sync {
    async fn message(&self, id: MessageId) -> anyhow::Result<Option<MessageRecord>>;

    async fn conversation(&self, id: ConversationId) -> anyhow::Result<Option<ConversationRecord>>;

    /// Every message of a conversation, oldest first.
    async fn conversation_messages(&self, id: ConversationId) -> anyhow::Result<Vec<MessageRecord>>;

    async fn file(&self, id: FileId) -> anyhow::Result<Option<FileRecord>>;
}

#[derive(Default)]
struct CatalogState {
    messages: HashMap<MessageId, MessageRecord>,
    conversations: HashMap<ConversationId, ConversationRecord>,
    files: HashMap<FileId, FileRecord>,
}

/// Catalog held entirely in memory. Used by tests, demos and embedders that
/// mirror their records into the engine.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_message(&self, message: MessageRecord) {
        self.state.write().await.messages.insert(message.id, message);
    }

    pub async fn insert_conversation(&self, conversation: ConversationRecord) {
        self.state
            .write()
            .await
            .conversations
            .insert(conversation.id, conversation);
    }

    pub async fn insert_file(&self, file: FileRecord) {
        self.state.write().await.files.insert(file.id, file);
    }

    pub async fn remove_file(&self, id: FileId) -> Option<FileRecord> {
        self.state.write().await.files.remove(&id)
    }
}

#[async_trait]
impl ConversationCatalog for InMemoryCatalog {
    async fn message(&self, id: MessageId) -> anyhow::Result<Option<MessageRecord>> {
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn conversation(&self, id: ConversationId) -> anyhow::Result<Option<ConversationRecord>> {
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn conversation_messages(&self, id: ConversationId) -> anyhow::Result<Vec<MessageRecord>> {
        let state = self.state.read().await;
        let mut messages: Vec<MessageRecord> = state
            .messages
            .values()
            .filter(|m| m.conversation_id == id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages)
    }

    async fn file(&self, id: FileId) -> anyhow::Result<Option<FileRecord>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }
}
