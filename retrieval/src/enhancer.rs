//! Context enhancement: embed the live query, search, assemble, splice.
//!
//! Every environmental failure degrades to less context rather than an
//! error. Searches report a tagged [`Outcome`]; the whole call reports a
//! [`ContextOutcome`]. Only a missing user is returned as `Err`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use semctx_embeddings::{EmbeddingGenerator, EmbeddingVector};
use semctx_vector_store::{
    FileChunkMatch, FileId, ProjectId, Role, SearchScope, SimilarConversation, SimilarMessage,
    UserId, VectorStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ContextOptions;
use crate::error::{Result, RetrievalError};
use crate::prompt::{BASIC_SYSTEM_MESSAGE, build_context_message};

/// Attached files only need to be non-opposed to the query.
const ATTACHED_FILE_THRESHOLD: f32 = 0.0;

/// A message of the live conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Files the user attached to this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_file_ids: Vec<FileId>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attached_file_ids: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_attachments(mut self, file_ids: impl IntoIterator<Item = FileId>) -> Self {
        self.attached_file_ids.extend(file_ids);
        self
    }
}

/// Why a request fell back to basic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicReason {
    /// Vectorization is switched off.
    Disabled,
    /// There is no user message to search with.
    NoUserMessage,
    /// The query produced no usable vector.
    NoEmbedding,
    /// Retrieval exceeded the configured time budget.
    TimedOut,
}

impl fmt::Display for BasicReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Disabled => "vectorization disabled",
            Self::NoUserMessage => "no user message",
            Self::NoEmbedding => "no usable query embedding",
            Self::TimedOut => "context retrieval timed out",
        };
        f.write_str(reason)
    }
}

/// How an enhancement request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOutcome {
    /// Retrieval ran; the sections may still be empty.
    Enhanced,
    Basic(BasicReason),
}

/// Result of one search step.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Found(T),
    /// The search failed and contributes nothing.
    Degraded(String),
}

impl<T> Outcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

impl<T: Default> Outcome<T> {
    fn found_or_default(self, what: &str) -> T {
        match self {
            Self::Found(value) => value,
            Self::Degraded(reason) => {
                warn!("{what} search degraded: {reason}");
                T::default()
            }
        }
    }
}

impl<T> From<semctx_vector_store::Result<T>> for Outcome<T> {
    fn from(result: semctx_vector_store::Result<T>) -> Self {
        match result {
            Ok(value) => Self::Found(value),
            Err(e) => Self::Degraded(e.to_string()),
        }
    }
}

/// Context assembled for one request. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedContext {
    pub similar_messages: Vec<SimilarMessage>,
    pub similar_conversations: Vec<SimilarConversation>,
    pub file_snippets: Vec<FileChunkMatch>,
    pub contextual_system_message: String,
    pub enhanced_messages: Vec<ChatMessage>,
    pub outcome: ContextOutcome,
}

impl EnhancedContext {
    pub fn is_enhanced(&self) -> bool {
        self.outcome == ContextOutcome::Enhanced
    }

    /// Basic context: the generic system message ahead of the caller's
    /// messages, which are passed through untouched.
    fn basic(messages: Vec<ChatMessage>, reason: BasicReason) -> Self {
        debug!("Using basic context: {reason}");
        let mut enhanced_messages = Vec::with_capacity(messages.len() + 1);
        enhanced_messages.push(ChatMessage::system(BASIC_SYSTEM_MESSAGE));
        enhanced_messages.extend(messages);
        Self {
            similar_messages: Vec::new(),
            similar_conversations: Vec::new(),
            file_snippets: Vec::new(),
            contextual_system_message: BASIC_SYSTEM_MESSAGE.to_string(),
            enhanced_messages,
            outcome: ContextOutcome::Basic(reason),
        }
    }
}

struct Retrieved {
    messages: Vec<SimilarMessage>,
    conversations: Vec<SimilarConversation>,
    files: Vec<FileChunkMatch>,
}

/// Orchestrates retrieval for the live conversation turn.
pub struct ContextEnhancer {
    store: Arc<dyn VectorStore>,
    generator: Arc<EmbeddingGenerator>,
    timeout: Option<Duration>,
}

impl ContextEnhancer {
    pub fn new(store: Arc<dyn VectorStore>, generator: Arc<EmbeddingGenerator>) -> Self {
        Self {
            store,
            generator,
            timeout: None,
        }
    }

    /// Bound the embedding and search phase of each request.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Prepend a system message carrying relevant history to `messages`.
    ///
    /// Fails only when `user_id` is missing. Every other problem yields a
    /// basic context whose [`EnhancedContext::outcome`] names the reason.
    pub async fn enhance_messages_with_context(
        &self,
        messages: Vec<ChatMessage>,
        user_id: UserId,
        options: &ContextOptions,
        project_id: Option<ProjectId>,
    ) -> Result<EnhancedContext> {
        let scope = SearchScope::new(user_id, project_id)
            .map_err(|_| RetrievalError::MissingUser(user_id))?;

        if !self.generator.flag().is_enabled() {
            return Ok(EnhancedContext::basic(messages, BasicReason::Disabled));
        }

        let Some(query) = messages.iter().rev().find(|m| m.role == Role::User) else {
            return Ok(EnhancedContext::basic(messages, BasicReason::NoUserMessage));
        };

        let retrieval = self.retrieve(query, &scope, options);
        let retrieved = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, retrieval).await {
                Ok(retrieved) => retrieved,
                Err(_) => {
                    warn!("Context retrieval exceeded {limit:?}");
                    Err(BasicReason::TimedOut)
                }
            },
            None => retrieval.await,
        };
        let retrieved = match retrieved {
            Ok(retrieved) => retrieved,
            Err(reason) => return Ok(EnhancedContext::basic(messages, reason)),
        };

        let system_message = build_context_message(
            &retrieved.conversations,
            &retrieved.messages,
            &retrieved.files,
            options.max_context_length,
        );

        let mut enhanced_messages = Vec::with_capacity(messages.len() + 1);
        enhanced_messages.push(ChatMessage::system(system_message.clone()));
        enhanced_messages.extend(messages.into_iter().filter(|m| m.role != Role::System));

        debug!(
            "Enhanced context: {} conversations, {} messages, {} file snippets",
            retrieved.conversations.len(),
            retrieved.messages.len(),
            retrieved.files.len()
        );

        Ok(EnhancedContext {
            similar_messages: retrieved.messages,
            similar_conversations: retrieved.conversations,
            file_snippets: retrieved.files,
            contextual_system_message: system_message,
            enhanced_messages,
            outcome: ContextOutcome::Enhanced,
        })
    }

    async fn retrieve(
        &self,
        query: &ChatMessage,
        scope: &SearchScope,
        options: &ContextOptions,
    ) -> std::result::Result<Retrieved, BasicReason> {
        let embedding = self.generator.generate_detailed(&query.content).await;
        if embedding.vector.is_empty() {
            return Err(BasicReason::NoEmbedding);
        }
        if embedding.is_degraded() {
            debug!("Searching with a fallback query embedding");
        }
        let vector = &embedding.vector;

        let (files, messages, conversations) = tokio::join!(
            self.file_snippets(vector, scope, &query.attached_file_ids, options),
            self.similar_messages(vector, scope, options),
            self.similar_conversations(vector, scope, options),
        );

        Ok(Retrieved {
            messages: messages.found_or_default("Message"),
            conversations: conversations.found_or_default("Conversation"),
            files: files.found_or_default("File"),
        })
    }

    async fn similar_messages(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        options: &ContextOptions,
    ) -> Outcome<Vec<SimilarMessage>> {
        if !options.include_messages {
            return Outcome::Found(Vec::new());
        }
        self.store
            .find_similar_messages(
                query,
                scope,
                options.max_messages,
                options.similarity_threshold,
            )
            .await
            .into()
    }

    async fn similar_conversations(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        options: &ContextOptions,
    ) -> Outcome<Vec<SimilarConversation>> {
        if !options.include_conversations {
            return Outcome::Found(Vec::new());
        }
        self.store
            .find_similar_conversations(
                query,
                scope,
                options.max_conversations,
                options.similarity_threshold,
            )
            .await
            .into()
    }

    /// Attached files first at zero threshold, then generic matches not
    /// already present, up to `max_file_chunks` in total.
    async fn file_snippets(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        attached: &[FileId],
        options: &ContextOptions,
    ) -> Outcome<Vec<FileChunkMatch>> {
        let limit = options.max_file_chunks;

        let attached_outcome: Outcome<Vec<FileChunkMatch>> = if attached.is_empty() {
            Outcome::Found(Vec::new())
        } else {
            self.store
                .find_relevant_file_chunks_for_files(
                    query,
                    scope,
                    attached,
                    limit,
                    ATTACHED_FILE_THRESHOLD,
                )
                .await
                .into()
        };

        let generic_outcome: Outcome<Vec<FileChunkMatch>> = if options.include_files {
            self.store
                .find_relevant_file_chunks(query, scope, limit, options.similarity_threshold)
                .await
                .into()
        } else {
            Outcome::Found(Vec::new())
        };

        if attached_outcome.is_degraded() && generic_outcome.is_degraded() {
            return attached_outcome;
        }

        let mut snippets = attached_outcome.found_or_default("Attached file");
        let mut seen: HashSet<(FileId, usize)> = snippets.iter().map(FileChunkMatch::key).collect();
        for chunk in generic_outcome.found_or_default("File") {
            if snippets.len() >= limit {
                break;
            }
            if seen.insert(chunk.key()) {
                snippets.push(chunk);
            }
        }
        snippets.truncate(limit);

        Outcome::Found(snippets)
    }
}
