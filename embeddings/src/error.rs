//! Failures of the primary embedding path.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors raised by providers and the similarity math.
///
/// None of these escape [`crate::EmbeddingGenerator`]: every failure of the
/// primary path is converted into a hash fallback there.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The HTTP provider has no API key.
    #[error("no API key configured for the embedding endpoint")]
    MissingApiKey,

    /// The endpoint answered with a non-success status.
    #[error("embedding request rejected: {0}")]
    ApiRequest(String),

    /// The endpoint answered 2xx but the body carried no usable vector.
    #[error("unusable embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding endpoint is rate limiting, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Two vectors of different lengths were compared.
    #[error("vector length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
