//! # Embeddings
//!
//! Embedding generation for semantic context retrieval.
//!
//! ## Features
//!
//! - **Embedding Generation**: Clean text and turn it into dense vectors
//! - **Worker Pool**: Keep embedding work off the request path
//! - **Hash Fallback**: Deterministic local vectors when the primary model is down
//! - **Similarity**: Cosine scoring and top-k ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingGenerator ──► WorkerPool ──► EmbeddingProvider        │
//! │       │       │                          (OpenAI / Hash)        │
//! │       ▼       ▼                                                 │
//! │  EmbeddingCache  HashEmbedder (fallback)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod flag;
pub mod generator;
pub mod hash;
pub mod pool;
pub mod provider;
pub mod similarity;
pub mod vector;

pub use cache::{CacheStats, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use flag::FeatureFlag;
pub use generator::{
    DEFAULT_CACHE_ENTRIES, EmbeddingGenerator, EmbeddingSource, GeneratedEmbedding,
};
pub use hash::{DEFAULT_HASH_DIMENSIONS, HashEmbedder};
pub use pool::{PoolConfig, PoolStats, WorkerOutcome, WorkerPool, WorkerResult};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAiCompatibleProvider,
};
pub use similarity::{Scored, cosine_similarity, normalize, rank_by_similarity};
pub use vector::{DISABLED_MODEL, EMPTY_TEXT_MODEL, EmbeddingVector, clean_text, collapse_whitespace};
