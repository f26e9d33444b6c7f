//! Deterministic local hash embeddings.
//!
//! Feature hashing over lowercase alphanumeric tokens. The result is a pure
//! function of the input text: no model files, no network, no failure modes.
//! Relevance is far worse than a learned model, which is acceptable for the
//! fallback role it plays.

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;

/// Default dimensionality of hash embeddings.
pub const DEFAULT_HASH_DIMENSIONS: usize = 384;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    model: String,
}

impl HashEmbedder {
    /// Create an embedder producing `dimensions`-sized vectors.
    ///
    /// A zero dimension is bumped to one so every output can be normalized.
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model: format!("local-hash-{dimensions}"),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed text. Always returns a unit-length vector of `dimensions` values.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let tokens = tokenize(text);
        if tokens.is_empty() {
            // Punctuation-only input still deserves a stable, non-zero vector.
            self.scatter(&mut vector, text.as_bytes());
        } else {
            for token in &tokens {
                self.scatter(&mut vector, token.as_bytes());
            }
        }

        normalize(&mut vector);
        vector
    }

    fn scatter(&self, vector: &mut [f32], bytes: &[u8]) {
        let hash = fnv1a_32(bytes);
        let index = hash as usize % self.dimensions;
        let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;

        // Opposite-sign collisions can cancel to zero; nudge so normalize has
        // something to work with.
        if vector.iter().all(|v| *v == 0.0) {
            vector[index] = sign;
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_dimension(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let embedding = self.embed_text(&request.text);
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.model.clone(),
            tokens_used: Some(tokenize(&request.text).len() as u64),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;
    use pretty_assertions::assert_eq;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, WORLD! rust-lang 2024"),
            vec!["hello", "world", "rust", "lang", "2024"]
        );
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed_text("The quick brown fox");
        let b = embedder.embed_text("The quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASH_DIMENSIONS);
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let embedder = HashEmbedder::default();
        for text in ["a", "hello world", "!!!", "repeat repeat repeat", "Ünïcödé wörds"] {
            let v = embedder.embed_text(text);
            assert!((norm(&v) - 1.0).abs() < 1e-5, "norm for {text:?}");
        }
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed_text("Rust borrow checker");
        let b = embedder.embed_text("rust, BORROW checker!");
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed_text("how do I configure the database pool");
        let near = embedder.embed_text("configure the database pool size");
        let far = embedder.embed_text("banana smoothie recipe");
        let near_score = cosine_similarity(&query, &near).unwrap();
        let far_score = cosine_similarity(&query, &far).unwrap();
        assert!(near_score > far_score);
    }

    #[test]
    fn test_model_tag_includes_dimensions() {
        assert_eq!(HashEmbedder::new(64).model(), "local-hash-64");
        assert_eq!(HashEmbedder::new(0).dimensions(), 1);
    }
}
