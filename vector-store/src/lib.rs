//! # Vector Store
//!
//! Storage and scoped similarity search over embeddings of messages,
//! conversation summaries and file chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Vector Store                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  FileIndexer ──► FileChunker                                    │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  VectorStore (InMemoryVectorStore, JSON snapshot)               │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  ConversationCatalog (ownership, archive and file status)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are tagged with the model that produced them and a query only
//! scores rows from the same model.

pub mod catalog;
pub mod chunker;
pub mod error;
pub mod indexer;
pub mod store;
pub mod types;

pub use catalog::{ConversationCatalog, InMemoryCatalog};
pub use chunker::{DEFAULT_OVERLAP_CHARS, DEFAULT_WINDOW_CHARS, FileChunker, TextChunk};
pub use error::{Result, StoreError};
pub use indexer::FileIndexer;
pub use store::{InMemoryVectorStore, StoreStats, VectorStore};
pub use types::{
    ConversationEmbedding, ConversationId, ConversationRecord, FileChunk, FileChunkMatch, FileId,
    FileRecord, FileStatus, MessageEmbedding, MessageId, MessageRecord, ProjectId, Role,
    SearchScope, SimilarConversation, SimilarMessage, UserId,
};
