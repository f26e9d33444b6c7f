//! Embedding generation with a primary model and a hash fallback.
//!
//! [`EmbeddingGenerator`] never fails. The primary path goes through the
//! [`WorkerPool`]; when the pool is missing, unavailable, or a dispatch
//! fails, the generator computes a [`HashEmbedder`] vector instead and tags
//! the result so callers can see the degradation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheStats, EmbeddingCache};
use crate::flag::FeatureFlag;
use crate::hash::{DEFAULT_HASH_DIMENSIONS, HashEmbedder};
use crate::pool::{WorkerOutcome, WorkerPool, WorkerResult};
use crate::vector::{DISABLED_MODEL, EMPTY_TEXT_MODEL, EmbeddingVector, clean_text};

/// Default number of primary embeddings kept in memory.
pub const DEFAULT_CACHE_ENTRIES: usize = 10_000;

/// Where a generated vector came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingSource {
    /// Computed by the primary provider on a worker.
    Primary,
    /// Primary vector served from the cache.
    Cached,
    /// Hash fallback, with the reason the primary path was skipped.
    Fallback { reason: String },
    /// Input was empty after cleaning; the vector has zero dimensions.
    EmptyText,
    /// Vectorization is switched off; the vector has zero dimensions.
    Disabled,
}

/// A vector plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEmbedding {
    pub vector: EmbeddingVector,
    pub source: EmbeddingSource,
}

impl GeneratedEmbedding {
    fn disabled() -> Self {
        Self {
            vector: EmbeddingVector::empty(DISABLED_MODEL),
            source: EmbeddingSource::Disabled,
        }
    }

    fn empty_text() -> Self {
        Self {
            vector: EmbeddingVector::empty(EMPTY_TEXT_MODEL),
            source: EmbeddingSource::EmptyText,
        }
    }

    /// True when the vector came from the hash fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, EmbeddingSource::Fallback { .. })
    }
}

/// Turns text into [`EmbeddingVector`]s.
pub struct EmbeddingGenerator {
    pool: Option<Arc<WorkerPool>>,
    fallback: HashEmbedder,
    cache: EmbeddingCache,
    flag: FeatureFlag,
}

impl EmbeddingGenerator {
    /// Create a generator. With no pool every vector is a hash fallback.
    pub fn new(pool: Option<Arc<WorkerPool>>, flag: FeatureFlag) -> Self {
        Self {
            pool,
            fallback: HashEmbedder::new(DEFAULT_HASH_DIMENSIONS),
            cache: EmbeddingCache::new(DEFAULT_CACHE_ENTRIES),
            flag,
        }
    }

    /// Set the fallback dimensionality.
    pub fn with_fallback_dimensions(mut self, dimensions: usize) -> Self {
        self.fallback = HashEmbedder::new(dimensions);
        self
    }

    /// Set the primary cache capacity. Zero disables caching.
    pub fn with_cache_capacity(mut self, max_entries: usize) -> Self {
        self.cache = EmbeddingCache::new(max_entries);
        self
    }

    pub fn flag(&self) -> &FeatureFlag {
        &self.flag
    }

    pub fn pool(&self) -> Option<&Arc<WorkerPool>> {
        self.pool.as_ref()
    }

    pub fn fallback_model(&self) -> &str {
        self.fallback.model()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Embed `text`. Zero-dimension results mean "no signal", not failure.
    pub async fn generate(&self, text: &str) -> EmbeddingVector {
        self.generate_detailed(text).await.vector
    }

    /// Embed `text` and report which path produced the vector.
    pub async fn generate_detailed(&self, text: &str) -> GeneratedEmbedding {
        if !self.flag.is_enabled() {
            return GeneratedEmbedding::disabled();
        }

        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return GeneratedEmbedding::empty_text();
        }

        if let Some(vector) = self.cached(&cleaned).await {
            debug!("Cache hit for embedding");
            return GeneratedEmbedding {
                vector,
                source: EmbeddingSource::Cached,
            };
        }

        let Some(pool) = self.ready_pool() else {
            return self.fallback_for(&cleaned, self.unavailable_reason());
        };

        let result = pool.dispatch(&cleaned).await;
        self.accept(&cleaned, result).await
    }

    /// Embed many texts. Output order matches input order.
    pub async fn generate_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<EmbeddingVector> {
        self.generate_batch_detailed(texts)
            .await
            .into_iter()
            .map(|generated| generated.vector)
            .collect()
    }

    /// Batch variant of [`Self::generate_detailed`].
    pub async fn generate_batch_detailed<S: AsRef<str>>(
        &self,
        texts: &[S],
    ) -> Vec<GeneratedEmbedding> {
        if !self.flag.is_enabled() {
            return texts.iter().map(|_| GeneratedEmbedding::disabled()).collect();
        }

        let mut results: Vec<Option<GeneratedEmbedding>> = Vec::with_capacity(texts.len());
        let mut pending: Vec<(usize, String)> = Vec::new();

        for (index, text) in texts.iter().enumerate() {
            let cleaned = clean_text(text.as_ref());
            if cleaned.is_empty() {
                results.push(Some(GeneratedEmbedding::empty_text()));
            } else if let Some(vector) = self.cached(&cleaned).await {
                results.push(Some(GeneratedEmbedding {
                    vector,
                    source: EmbeddingSource::Cached,
                }));
            } else {
                results.push(None);
                pending.push((index, cleaned));
            }
        }

        if !pending.is_empty() {
            match self.ready_pool() {
                Some(pool) => {
                    let inputs: Vec<&str> = pending.iter().map(|(_, text)| text.as_str()).collect();
                    let dispatched = pool.dispatch_batch(&inputs).await;
                    for ((index, cleaned), result) in pending.iter().zip(dispatched) {
                        results[*index] = Some(self.accept(cleaned, result).await);
                    }
                }
                None => {
                    let reason = self.unavailable_reason();
                    for (index, cleaned) in &pending {
                        results[*index] = Some(self.fallback_for(cleaned, reason.clone()));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|generated| generated.unwrap_or_else(GeneratedEmbedding::empty_text))
            .collect()
    }

    async fn cached(&self, cleaned: &str) -> Option<EmbeddingVector> {
        let pool = self.pool.as_ref()?;
        self.cache.get(cleaned, pool.provider_model()).await
    }

    fn ready_pool(&self) -> Option<&Arc<WorkerPool>> {
        self.pool.as_ref().filter(|pool| pool.is_ready())
    }

    fn unavailable_reason(&self) -> String {
        match &self.pool {
            None => "no primary embedding provider configured".to_string(),
            Some(pool) => format!("primary provider '{}' unavailable", pool.provider_name()),
        }
    }

    async fn accept(&self, cleaned: &str, result: WorkerResult) -> GeneratedEmbedding {
        match result.outcome {
            WorkerOutcome::Embedded { vector, model, .. } => {
                let vector = EmbeddingVector::new(vector, model);
                if let Some(pool) = &self.pool {
                    self.cache
                        .put(cleaned, pool.provider_model(), vector.clone())
                        .await;
                }
                GeneratedEmbedding {
                    vector,
                    source: EmbeddingSource::Primary,
                }
            }
            WorkerOutcome::Failed { error } => {
                warn!("Primary embedding failed, using hash fallback: {error}");
                self.fallback_for(cleaned, error)
            }
        }
    }

    fn fallback_for(&self, cleaned: &str, reason: String) -> GeneratedEmbedding {
        debug!("Hash embedding fallback: {reason}");
        GeneratedEmbedding {
            vector: EmbeddingVector::new(self.fallback.embed_text(cleaned), self.fallback.model()),
            source: EmbeddingSource::Fallback { reason },
        }
    }
}
