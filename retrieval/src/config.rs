//! Configuration for the context retrieval engine.

use std::path::Path;
use std::time::Duration;

use semctx_embeddings::{DEFAULT_CACHE_ENTRIES, DEFAULT_HASH_DIMENSIONS, PoolConfig};
use semctx_vector_store::{DEFAULT_OVERLAP_CHARS, DEFAULT_WINDOW_CHARS, FileChunker};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Configuration for the context retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Initial state of the vectorization feature flag.
    pub vectorization_enabled: bool,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Worker pool configuration.
    pub pool: PoolSettings,

    /// File chunking configuration.
    pub chunking: ChunkingConfig,

    /// Vectorization queue configuration.
    pub queue: QueueConfig,

    /// Context enhancement configuration.
    pub context: ContextConfig,
}

impl RetrievalConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        self.chunking.chunker()?;
        if self.embedding.fallback_dimensions == 0 {
            return Err(RetrievalError::Config(
                "embedding.fallback_dimensions must be positive".to_string(),
            ));
        }
        if self.pool.job_timeout_ms == 0 {
            return Err(RetrievalError::Config(
                "pool.job_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the context configuration.
    pub fn with_context(mut self, config: ContextConfig) -> Self {
        self.context = config;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vectorization_enabled: true,
            embedding: EmbeddingConfig::default(),
            pool: PoolSettings::default(),
            chunking: ChunkingConfig::default(),
            queue: QueueConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which primary provider to use.
    pub provider: EmbeddingProviderType,

    /// Base URL of an OpenAI-compatible API. `None` uses the public API.
    pub base_url: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Model to request from the primary provider.
    pub model: Option<String>,

    /// Dimensions to request from the primary provider.
    pub dimensions: Option<usize>,

    /// Dimensionality of the hash fallback.
    pub fallback_dimensions: usize,

    /// Maximum cached primary embeddings. Zero disables the cache.
    pub cache_max_entries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAi,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: None,
            dimensions: None,
            fallback_dimensions: DEFAULT_HASH_DIMENSIONS,
            cache_max_entries: DEFAULT_CACHE_ENTRIES,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Local hash embeddings as the primary model.
    Hash,
    /// No primary model; every vector is a hash fallback.
    None,
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Worker count. `None` uses the available CPU parallelism.
    pub workers: Option<usize>,

    /// Per-job timeout in milliseconds.
    pub job_timeout_ms: u64,

    /// Jobs buffered per worker.
    pub channel_capacity: usize,
}

impl PoolSettings {
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            job_timeout: Duration::from_millis(self.job_timeout_ms),
            channel_capacity: self.channel_capacity,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        Self {
            workers: defaults.workers,
            job_timeout_ms: u64::try_from(defaults.job_timeout.as_millis()).unwrap_or(30_000),
            channel_capacity: defaults.channel_capacity,
        }
    }
}

/// File chunking windows, in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub window_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn chunker(&self) -> Result<FileChunker> {
        FileChunker::new(self.window_chars, self.overlap_chars)
            .map_err(|e| RetrievalError::Config(e.to_string()))
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: DEFAULT_WINDOW_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// Background queue draining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Interval between drains when nothing wakes the drainer, in milliseconds.
    pub drain_interval_ms: u64,
}

impl QueueConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms.max(1))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 5_000,
        }
    }
}

/// Context enhancement defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Preset used when the caller does not pass options.
    pub preset: ContextPreset,

    /// Upper bound on embedding and search per request, in milliseconds.
    pub enhance_timeout_ms: Option<u64>,
}

impl ContextConfig {
    pub fn enhance_timeout(&self) -> Option<Duration> {
        self.enhance_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            preset: ContextPreset::Standard,
            enhance_timeout_ms: None,
        }
    }
}

/// Named parameterizations of context enhancement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPreset {
    /// Tight threshold, past conversations only.
    Minimal,
    #[default]
    Standard,
    /// Loose threshold, larger budget.
    Comprehensive,
}

impl ContextPreset {
    pub fn options(self) -> ContextOptions {
        match self {
            Self::Minimal => ContextOptions {
                include_messages: false,
                include_conversations: true,
                include_files: false,
                max_messages: 0,
                max_conversations: 2,
                max_file_chunks: 2,
                similarity_threshold: 0.85,
                max_context_length: 800,
            },
            Self::Standard => ContextOptions {
                include_messages: true,
                include_conversations: true,
                include_files: true,
                max_messages: 5,
                max_conversations: 3,
                max_file_chunks: 4,
                similarity_threshold: 0.75,
                max_context_length: 2000,
            },
            Self::Comprehensive => ContextOptions {
                include_messages: true,
                include_conversations: true,
                include_files: true,
                max_messages: 10,
                max_conversations: 5,
                max_file_chunks: 6,
                similarity_threshold: 0.65,
                max_context_length: 3000,
            },
        }
    }
}

/// Per-request context enhancement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    pub include_messages: bool,
    pub include_conversations: bool,
    /// Generic file search. Attached files are searched regardless.
    pub include_files: bool,
    pub max_messages: usize,
    pub max_conversations: usize,
    /// Cap on file snippets, attached and generic together.
    pub max_file_chunks: usize,
    /// Minimum cosine similarity for generic searches.
    pub similarity_threshold: f32,
    /// Character budget of the assembled system message.
    pub max_context_length: usize,
}

impl ContextOptions {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_context_length(mut self, max_context_length: usize) -> Self {
        self.max_context_length = max_context_length;
        self
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextPreset::Standard.options()
    }
}

impl From<ContextPreset> for ContextOptions {
    fn from(preset: ContextPreset) -> Self {
        preset.options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            RetrievalConfig::from_toml_str("").unwrap(),
            RetrievalConfig::default()
        );
    }

    #[test]
    fn test_parse_sections() {
        let config = RetrievalConfig::from_toml_str(
            r#"
vectorization_enabled = false

[embedding]
provider = "hash"
fallback_dimensions = 128

[pool]
workers = 2
job_timeout_ms = 500

[chunking]
window_chars = 400
overlap_chars = 50

[context]
preset = "comprehensive"
enhance_timeout_ms = 1500
"#,
        )
        .unwrap();

        assert!(!config.vectorization_enabled);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hash);
        assert_eq!(config.embedding.fallback_dimensions, 128);
        assert_eq!(config.embedding.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pool.to_pool_config().workers, Some(2));
        assert_eq!(
            config.pool.to_pool_config().job_timeout,
            Duration::from_millis(500)
        );
        assert_eq!(config.chunking.chunker().unwrap().window_chars(), 400);
        assert_eq!(config.context.preset, ContextPreset::Comprehensive);
        assert_eq!(
            config.context.enhance_timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_openai_provider_name() {
        let config = RetrievalConfig::from_toml_str("[embedding]\nprovider = \"openai\"").unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProviderType::OpenAi);
    }

    #[test]
    fn test_rejects_bad_chunking() {
        let err = RetrievalConfig::from_toml_str("[chunking]\nwindow_chars = 100\noverlap_chars = 100")
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = RetrievalConfig::from_toml_str("vectorization_enabled = \"maybe\"").unwrap_err();
        assert!(matches!(err, RetrievalError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retrieval.toml");
        std::fs::write(&path, "[queue]\ndrain_interval_ms = 250\n").unwrap();
        let config = RetrievalConfig::load(&path).unwrap();
        assert_eq!(config.queue.drain_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_presets() {
        let minimal = ContextPreset::Minimal.options();
        assert_eq!(minimal.similarity_threshold, 0.85);
        assert_eq!(minimal.max_context_length, 800);
        assert!(minimal.include_conversations);
        assert!(!minimal.include_messages && !minimal.include_files);

        let standard = ContextOptions::default();
        assert_eq!(standard.similarity_threshold, 0.75);
        assert_eq!(standard.max_context_length, 2000);
        assert!(standard.include_messages && standard.include_files);

        let comprehensive = ContextOptions::from(ContextPreset::Comprehensive);
        assert_eq!(comprehensive.similarity_threshold, 0.65);
        assert_eq!(comprehensive.max_context_length, 3000);
    }
}
