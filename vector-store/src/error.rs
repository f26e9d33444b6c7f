//! Error types for the vector store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the vector store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A search was issued without a user to scope it to.
    #[error("search scope requires a user id, got {0}")]
    MissingUser(i64),

    /// The conversation/file catalog failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] anyhow::Error),

    /// Chunker configuration is unusable.
    #[error("invalid chunking: {0}")]
    InvalidChunking(String),

    /// Similarity computation failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] semctx_embeddings::EmbeddingError),

    /// A snapshot file was written by an incompatible version.
    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshot(u32),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error stems from a caller mistake rather than the environment.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::MissingUser(_) | Self::InvalidChunking(_))
    }
}
