//! Error types for the context retrieval engine.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
///
/// Environmental failures inside context enhancement are absorbed and
/// reported through the returned context instead; what surfaces here is
/// caller misuse, configuration problems and explicit storage calls.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// A scoped call was made without a user.
    #[error("a user id is required, got {0}")]
    MissingUser(i64),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] semctx_embeddings::EmbeddingError),

    /// Vector store error.
    #[error("store error: {0}")]
    Store(#[from] semctx_vector_store::StoreError),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// Whether the caller, not the environment, is at fault.
    pub fn is_misuse(&self) -> bool {
        match self {
            Self::MissingUser(_) => true,
            Self::Store(err) => err.is_misuse(),
            _ => false,
        }
    }
}
