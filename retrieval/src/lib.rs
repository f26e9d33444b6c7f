//! # Context Retrieval Engine
//!
//! This crate augments a live chat turn with semantically relevant history:
//!
//! - **Vectorization Queue**: Background embedding of messages and conversations
//! - **File Indexing**: Chunked embeddings of uploaded files
//! - **Context Enhancer**: Scoped similarity search and prompt assembly
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Context Engine                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │Vectorization │  │    File      │  │   Context    │           │
//! │  │    Queue     │  │   Indexer    │  │   Enhancer   │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │        ┌──────────────────┐    ┌──────────────────┐             │
//! │        │    Embedding     │    │   Vector Store   │             │
//! │        │    Generator     │    │  (scoped search) │             │
//! │        └──────────────────┘    └──────────────────┘             │
//! │                 │                                               │
//! │                 ▼                                               │
//! │        ┌──────────────────┐                                     │
//! │        │   Worker Pool    │                                     │
//! │        └──────────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semctx_retrieval::{ChatMessage, ContextEngine, Priority};
//!
//! let engine = ContextEngine::builder()
//!     .with_catalog(catalog)
//!     .with_snapshot_path("~/.semctx/vectors.json")
//!     .build()
//!     .await?;
//!
//! engine.queue_message_vectorization(message_id, conversation_id, Priority::Normal).await;
//! engine.start_background_drain().await;
//!
//! let context = engine
//!     .enhance_messages_with_context(messages, user_id, &engine.default_options(), None)
//!     .await?;
//! ```

pub mod config;
pub mod engine;
pub mod enhancer;
pub mod error;
pub mod prompt;
pub mod queue;

pub use config::{
    ChunkingConfig, ContextConfig, ContextOptions, ContextPreset, EmbeddingConfig,
    EmbeddingProviderType, PoolSettings, QueueConfig, RetrievalConfig,
};
pub use engine::{ContextEngine, ContextEngineBuilder, EngineStats};
pub use enhancer::{
    BasicReason, ChatMessage, ContextEnhancer, ContextOutcome, EnhancedContext, Outcome,
};
pub use error::{Result, RetrievalError};
pub use prompt::{BASIC_SYSTEM_MESSAGE, TRUNCATION_MARKER, build_context_message, truncate_chars};
pub use queue::{DrainReport, JobKind, Priority, QueueStatus, VectorizationJob, VectorizationQueue};

// Re-export from dependencies for convenience
pub use semctx_embeddings::{EmbeddingProvider, EmbeddingVector, FeatureFlag};
pub use semctx_vector_store::{
    ConversationCatalog, FileChunkMatch, InMemoryCatalog, Role, SimilarConversation,
    SimilarMessage, VectorStore,
};
