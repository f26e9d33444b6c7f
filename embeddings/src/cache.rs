//! Cache of primary-model embeddings.
//!
//! Only vectors produced by the primary provider are cached; hash fallbacks
//! are cheap to recompute and must not mask a provider that has recovered.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::vector::EmbeddingVector;

struct CacheEntry {
    vector: EmbeddingVector,
    /// Insertion sequence number, used for oldest-first eviction.
    inserted: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<u64, CacheEntry>,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

/// Bounded in-memory cache keyed by cleaned text and model.
pub struct EmbeddingCache {
    state: RwLock<CacheState>,
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a cache holding at most `max_entries` vectors. Zero disables it.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries,
        }
    }

    fn hash_key(text: &str, model: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        model.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up the vector `model` produced for `text`.
    pub async fn get(&self, text: &str, model: &str) -> Option<EmbeddingVector> {
        if self.max_entries == 0 {
            return None;
        }
        let key = Self::hash_key(text, model);
        let mut state = self.state.write().await;
        match state.entries.get(&key).map(|e| e.vector.clone()) {
            Some(vector) => {
                state.hits += 1;
                Some(vector)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store the vector `model` produced for `text`, evicting the oldest
    /// entry at capacity.
    pub async fn put(&self, text: &str, model: &str, vector: EmbeddingVector) {
        if self.max_entries == 0 {
            return;
        }
        let key = Self::hash_key(text, model);
        let mut state = self.state.write().await;

        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            if let Some(oldest_key) = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.inserted)
                .map(|(k, _)| *k)
            {
                state.entries.remove(&oldest_key);
            }
        }

        let inserted = state.next_seq;
        state.next_seq += 1;
        debug!("Cached embedding (model: {})", vector.model());
        state.entries.insert(key, CacheEntry { vector, inserted });
    }

    /// Drop every entry, e.g. after switching primary models.
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            hits: state.hits,
            misses: state.misses,
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}
