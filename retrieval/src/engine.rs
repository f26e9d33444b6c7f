//! Context engine implementation.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use semctx_embeddings::{
    CacheStats, EmbeddingGenerator, EmbeddingProvider, FeatureFlag, HashEmbedder,
    OpenAiCompatibleProvider, PoolStats, WorkerPool,
};
use semctx_vector_store::{
    ConversationCatalog, ConversationId, FileId, FileIndexer, InMemoryVectorStore, MessageId,
    ProjectId, StoreStats, UserId, VectorStore,
};

use crate::config::{ContextOptions, ContextPreset, EmbeddingProviderType, RetrievalConfig};
use crate::enhancer::{ChatMessage, ContextEnhancer, EnhancedContext};
use crate::error::{Result, RetrievalError};
use crate::queue::{DrainReport, Priority, QueueStatus, VectorizationJob, VectorizationQueue};

/// Semantic context retrieval engine.
///
/// This is the integration point for the chat application. It coordinates:
/// - Embedding generation through a lazily started worker pool
/// - Background vectorization of messages and conversations
/// - File indexing and scoped similarity search
/// - Assembly of the contextual system message
pub struct ContextEngine {
    /// Configuration.
    config: RetrievalConfig,

    /// Vectorization feature flag, shared with the generator.
    flag: FeatureFlag,

    /// Embedding generation.
    generator: Arc<EmbeddingGenerator>,

    /// Embedding rows.
    store: Arc<dyn VectorStore>,

    /// File chunking and indexing.
    indexer: FileIndexer,

    /// Pending vectorization jobs.
    queue: Arc<VectorizationQueue>,

    /// Context assembly.
    enhancer: ContextEnhancer,

    /// Background drainer, when running.
    drainer: Mutex<Option<Drainer>>,
}

struct Drainer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ContextEngine {
    /// Create a new context engine builder.
    pub fn builder() -> ContextEngineBuilder {
        ContextEngineBuilder::new()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Options of the configured preset.
    pub fn default_options(&self) -> ContextOptions {
        self.config.context.preset.options()
    }

    /// Augment `messages` with relevant history for `user_id`.
    ///
    /// See [`ContextEnhancer::enhance_messages_with_context`].
    pub async fn enhance_messages_with_context(
        &self,
        messages: Vec<ChatMessage>,
        user_id: UserId,
        options: &ContextOptions,
        project_id: Option<ProjectId>,
    ) -> Result<EnhancedContext> {
        self.enhancer
            .enhance_messages_with_context(messages, user_id, options, project_id)
            .await
    }

    /// Queue a persisted message for embedding.
    pub async fn queue_message_vectorization(
        &self,
        message_id: MessageId,
        conversation_id: ConversationId,
        priority: Priority,
    ) {
        self.queue
            .enqueue(VectorizationJob::message(message_id, conversation_id, priority))
            .await;
    }

    /// Queue a conversation for (re-)embedding of its transcript.
    pub async fn queue_conversation_vectorization(
        &self,
        conversation_id: ConversationId,
        priority: Priority,
    ) {
        self.queue
            .enqueue(VectorizationJob::conversation(conversation_id, priority))
            .await;
    }

    /// Chunk, embed and store the extracted text of a file.
    pub async fn index_file_content(&self, file_id: FileId, text: &str) -> Result<usize> {
        Ok(self.indexer.index_file_content(file_id, text).await?)
    }

    /// Remove every chunk of a file.
    pub async fn clear_file_embeddings(&self, file_id: FileId) -> Result<usize> {
        Ok(self.indexer.clear_file_embeddings(file_id).await?)
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    /// Embed everything currently queued.
    pub async fn drain_queue(&self) -> DrainReport {
        self.queue.drain().await
    }

    /// Start draining the queue in the background. Returns `false` if a
    /// drainer is already running.
    pub async fn start_background_drain(&self) -> bool {
        let mut drainer = self.drainer.lock().await;
        if drainer.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = self
            .queue
            .spawn_drainer(self.config.queue.drain_interval(), cancel.clone());
        *drainer = Some(Drainer { cancel, handle });
        true
    }

    /// Stop background work, stop the worker pool and flush the store.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(drainer) = self.drainer.lock().await.take() {
            drainer.cancel.cancel();
            if let Err(e) = drainer.handle.await {
                warn!("Vectorization drainer ended abnormally: {e}");
            }
        }

        if let Some(pool) = self.generator.pool() {
            pool.shutdown();
        }

        self.store.flush().await?;
        info!("Context engine shut down");
        Ok(())
    }

    /// Switch vectorization on or off for this engine.
    pub fn set_vectorization_enabled(&self, enabled: bool) {
        self.flag.set(enabled);
        info!("Vectorization {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_vectorization_enabled(&self) -> bool {
        self.flag.is_enabled()
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            vectorization_enabled: self.flag.is_enabled(),
            store: self.store.stats().await,
            queue: self.queue.status().await,
            pool: self.generator.pool().map(|pool| pool.stats()),
            cache: self.generator.cache_stats().await,
        }
    }
}

/// Builder for the context engine.
pub struct ContextEngineBuilder {
    config: RetrievalConfig,
    catalog: Option<Arc<dyn ConversationCatalog>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    snapshot_path: Option<PathBuf>,
}

impl ContextEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            catalog: None,
            provider: None,
            store: None,
            snapshot_path: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the catalog that owns messages, conversations and files. Required.
    pub fn with_catalog(mut self, catalog: Arc<dyn ConversationCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use `provider` as the primary embedding model instead of the
    /// configured one.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the embedding provider type.
    pub fn with_embedding_provider(mut self, provider: EmbeddingProviderType) -> Self {
        self.config.embedding.provider = provider;
        self
    }

    /// Use a custom vector store. Overrides the snapshot path.
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist the in-memory store to this JSON file.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Set the initial state of the vectorization flag.
    pub fn with_vectorization_enabled(mut self, enabled: bool) -> Self {
        self.config.vectorization_enabled = enabled;
        self
    }

    /// Set the default context preset.
    pub fn with_preset(mut self, preset: ContextPreset) -> Self {
        self.config.context.preset = preset;
        self
    }

    /// Build the engine.
    pub async fn build(self) -> Result<ContextEngine> {
        info!("Initializing context engine");
        self.config.validate()?;

        let catalog = self
            .catalog
            .ok_or_else(|| RetrievalError::Config("a conversation catalog is required".to_string()))?;

        let flag = FeatureFlag::new(self.config.vectorization_enabled);
        let provider = match self.provider {
            Some(provider) => Some(provider),
            None => configured_provider(&self.config)?,
        };
        let pool = provider.map(|provider| {
            debug!("Primary embedding provider: {}", provider.name());
            Arc::new(WorkerPool::new(provider, self.config.pool.to_pool_config()))
        });
        let generator = Arc::new(
            EmbeddingGenerator::new(pool, flag.clone())
                .with_fallback_dimensions(self.config.embedding.fallback_dimensions)
                .with_cache_capacity(self.config.embedding.cache_max_entries),
        );

        let store: Arc<dyn VectorStore> = match (self.store, self.snapshot_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(InMemoryVectorStore::open(path, Arc::clone(&catalog)).await?),
            (None, None) => Arc::new(InMemoryVectorStore::new(Arc::clone(&catalog))),
        };

        let indexer = FileIndexer::new(
            Arc::clone(&store),
            Arc::clone(&generator),
            self.config.chunking.chunker()?,
        );
        let queue = Arc::new(VectorizationQueue::new(
            catalog,
            Arc::clone(&generator),
            Arc::clone(&store),
        ));
        let enhancer = ContextEnhancer::new(Arc::clone(&store), Arc::clone(&generator))
            .with_timeout(self.config.context.enhance_timeout());

        info!(
            "Context engine initialized (vectorization {})",
            if flag.is_enabled() { "enabled" } else { "disabled" }
        );

        Ok(ContextEngine {
            config: self.config,
            flag,
            generator,
            store,
            indexer,
            queue,
            enhancer,
            drainer: Mutex::new(None),
        })
    }
}

impl Default for ContextEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn configured_provider(config: &RetrievalConfig) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let embedding = &config.embedding;
    let provider: Arc<dyn EmbeddingProvider> = match embedding.provider {
        EmbeddingProviderType::None => return Ok(None),
        EmbeddingProviderType::Hash => Arc::new(HashEmbedder::new(embedding.fallback_dimensions)),
        EmbeddingProviderType::OpenAi => {
            let mut provider = OpenAiCompatibleProvider::new()
                .with_api_key_from_env(&embedding.api_key_env)
                .with_timeout(config.pool.to_pool_config().job_timeout)?;
            if let Some(base_url) = &embedding.base_url {
                provider = provider.with_base_url(base_url);
            }
            if let Some(model) = &embedding.model {
                provider = provider.with_model(model);
            }
            if let Some(dimensions) = embedding.dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            if !provider.is_available() {
                warn!(
                    "{} is not set; embeddings will use the local hash fallback",
                    embedding.api_key_env
                );
            }
            Arc::new(provider)
        }
    };
    Ok(Some(provider))
}

/// Statistics about the context engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub vectorization_enabled: bool,

    /// Stored rows, per table and per model.
    pub store: StoreStats,

    /// Pending vectorization jobs.
    pub queue: QueueStatus,

    /// Worker pool counters, when a primary provider is configured.
    pub pool: Option<PoolStats>,

    pub cache: CacheStats,
}
