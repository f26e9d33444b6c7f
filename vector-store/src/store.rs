//! Embedding storage and scoped similarity search.
//!
//! Every row keeps the model tag of its vector. A search only scores rows
//! whose model and dimensionality match the query, so rows written by a
//! previous model stay inert until they are re-embedded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use semctx_embeddings::{EmbeddingVector, Scored, rank_by_similarity};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::catalog::ConversationCatalog;
use crate::error::{Result, StoreError};
use crate::types::{
    ConversationEmbedding, ConversationId, ConversationRecord, FileChunk, FileChunkMatch, FileId,
    FileRecord, FileStatus, MessageEmbedding, MessageId, SearchScope, SimilarConversation,
    SimilarMessage,
};

/// Row counts of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub message_rows: usize,
    pub conversation_rows: usize,
    pub file_chunk_rows: usize,
    pub files: usize,
    /// Rows per embedding model, across all tables.
    pub rows_by_model: BTreeMap<String, usize>,
}

/// Storage and search over message, conversation and file-chunk embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append an embedding row for a message.
    async fn store_message_embedding(
        &self,
        message_id: MessageId,
        vector: EmbeddingVector,
    ) -> Result<()>;

    /// Insert or replace the embedding of a conversation.
    async fn store_conversation_embedding(
        &self,
        conversation_id: ConversationId,
        summary: String,
        vector: EmbeddingVector,
    ) -> Result<()>;

    /// Insert or replace one chunk of a file.
    async fn store_file_chunk(
        &self,
        file_id: FileId,
        chunk_index: usize,
        text: String,
        vector: EmbeddingVector,
    ) -> Result<()>;

    /// Delete every chunk of a file. Returns the number removed.
    async fn clear_file_embeddings(&self, file_id: FileId) -> Result<usize>;

    async fn find_similar_messages(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarMessage>>;

    /// Like [`Self::find_similar_messages`], skipping archived conversations.
    async fn find_similar_conversations(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarConversation>>;

    /// Chunks of active files owned by the scope's user.
    async fn find_relevant_file_chunks(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<FileChunkMatch>>;

    /// Chunks restricted to `file_ids`, typically files attached to the
    /// current message. Callers usually pass a zero threshold.
    async fn find_relevant_file_chunks_for_files(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        file_ids: &[FileId],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<FileChunkMatch>>;

    async fn stats(&self) -> StoreStats;

    /// Persist pending writes, if the store is durable.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    messages: Vec<MessageEmbedding>,
    conversations: BTreeMap<ConversationId, ConversationEmbedding>,
    file_chunks: BTreeMap<FileId, BTreeMap<usize, FileChunk>>,
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    tables: Tables,
}

/// Vector store held in memory, optionally snapshotted to a JSON file.
pub struct InMemoryVectorStore {
    catalog: Arc<dyn ConversationCatalog>,
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryVectorStore {
    /// Create an empty, non-persistent store.
    pub fn new(catalog: Arc<dyn ConversationCatalog>) -> Self {
        Self {
            catalog,
            tables: RwLock::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a snapshot file, loading it if it exists.
    pub async fn open(path: impl AsRef<Path>, catalog: Arc<dyn ConversationCatalog>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(StoreError::UnsupportedSnapshot(snapshot.version));
            }
            info!(
                "Loaded vector store snapshot from {} ({} message rows)",
                path.display(),
                snapshot.tables.messages.len()
            );
            snapshot.tables
        } else {
            Tables::default()
        };

        Ok(Self {
            catalog,
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Write the snapshot file, if this store has one.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let content = {
            let tables = self.tables.read().await;
            serde_json::to_string(&SnapshotRef {
                version: SNAPSHOT_VERSION,
                tables: &tables,
            })?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash never leaves a torn snapshot.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        debug!("Saved vector store snapshot to {}", path.display());
        Ok(())
    }

    /// Score file chunks, optionally restricted to `only`, best first.
    async fn rank_file_chunks(
        &self,
        query: &EmbeddingVector,
        only: Option<&HashSet<FileId>>,
        threshold: f32,
    ) -> Result<Vec<Scored<(FileId, usize, String)>>> {
        let tables = self.tables.read().await;
        let candidates = tables
            .file_chunks
            .iter()
            .filter(|(file_id, _)| only.is_none_or(|ids| ids.contains(*file_id)))
            .flat_map(|(_, chunks)| chunks.values())
            .filter(|chunk| chunk.vector.is_comparable_to(query))
            .map(|chunk| {
                (
                    (chunk.file_id, chunk.chunk_index, chunk.text.clone()),
                    chunk.vector.values(),
                )
            });
        Ok(rank_by_similarity(query.values(), candidates, None, threshold)?)
    }

    /// Resolve ranked chunks against the file catalog until `limit` pass.
    async fn visible_chunks(
        &self,
        ranked: Vec<Scored<(FileId, usize, String)>>,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<FileChunkMatch>> {
        let mut files: HashMap<FileId, Option<FileRecord>> = HashMap::new();
        let mut matches = Vec::new();

        for Scored {
            item: (file_id, chunk_index, text),
            score,
        } in ranked
        {
            if matches.len() >= limit {
                break;
            }
            let file = match files.get(&file_id) {
                Some(file) => file.clone(),
                None => {
                    let file = self.catalog.file(file_id).await?;
                    files.insert(file_id, file.clone());
                    file
                }
            };
            let Some(file) = file else { continue };
            if file.status != FileStatus::Active || !scope.admits(file.user_id, file.project_id) {
                continue;
            }
            matches.push(FileChunkMatch {
                file_id,
                file_name: file.name,
                chunk_index,
                text,
                similarity: score,
            });
        }

        Ok(matches)
    }

    async fn cached_conversation(
        &self,
        cache: &mut HashMap<ConversationId, Option<ConversationRecord>>,
        id: ConversationId,
    ) -> Result<Option<ConversationRecord>> {
        if let Some(conversation) = cache.get(&id) {
            return Ok(conversation.clone());
        }
        let conversation = self.catalog.conversation(id).await?;
        cache.insert(id, conversation.clone());
        Ok(conversation)
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    tables: &'a Tables,
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn store_message_embedding(
        &self,
        message_id: MessageId,
        vector: EmbeddingVector,
    ) -> Result<()> {
        debug!(
            "Storing message embedding {message_id} ({} dims, model {})",
            vector.dimensions(),
            vector.model()
        );
        self.tables.write().await.messages.push(MessageEmbedding {
            message_id,
            vector,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn store_conversation_embedding(
        &self,
        conversation_id: ConversationId,
        summary: String,
        vector: EmbeddingVector,
    ) -> Result<()> {
        let row = ConversationEmbedding {
            conversation_id,
            summary,
            vector,
            updated_at: Utc::now(),
        };
        let replaced = self
            .tables
            .write()
            .await
            .conversations
            .insert(conversation_id, row)
            .is_some();
        debug!("Upserted conversation embedding {conversation_id} (replaced: {replaced})");
        Ok(())
    }

    async fn store_file_chunk(
        &self,
        file_id: FileId,
        chunk_index: usize,
        text: String,
        vector: EmbeddingVector,
    ) -> Result<()> {
        self.tables
            .write()
            .await
            .file_chunks
            .entry(file_id)
            .or_default()
            .insert(
                chunk_index,
                FileChunk {
                    file_id,
                    chunk_index,
                    text,
                    vector,
                },
            );
        Ok(())
    }

    async fn clear_file_embeddings(&self, file_id: FileId) -> Result<usize> {
        let removed = self
            .tables
            .write()
            .await
            .file_chunks
            .remove(&file_id)
            .map_or(0, |chunks| chunks.len());
        debug!("Cleared {removed} chunks of file {file_id}");
        Ok(removed)
    }

    async fn find_similar_messages(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarMessage>> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = {
            let tables = self.tables.read().await;
            let candidates = tables
                .messages
                .iter()
                .filter(|row| row.vector.is_comparable_to(query))
                .map(|row| (row.message_id, row.vector.values()));
            rank_by_similarity(query.values(), candidates, None, threshold)?
        };

        let mut seen = HashSet::new();
        let mut conversations = HashMap::new();
        let mut results = Vec::new();

        for Scored { item: id, score } in ranked {
            if results.len() >= limit {
                break;
            }
            // Re-embedded messages have several rows; report the best one.
            if !seen.insert(id) {
                continue;
            }
            let Some(message) = self.catalog.message(id).await? else {
                continue;
            };
            let Some(conversation) = self
                .cached_conversation(&mut conversations, message.conversation_id)
                .await?
            else {
                continue;
            };
            if !scope.admits(conversation.user_id, conversation.project_id) {
                continue;
            }
            results.push(SimilarMessage {
                id,
                content: message.content,
                role: message.role,
                conversation_id: message.conversation_id,
                similarity: score,
                created_at: message.created_at,
            });
        }

        debug!("Found {} similar messages", results.len());
        Ok(results)
    }

    async fn find_similar_conversations(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarConversation>> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = {
            let tables = self.tables.read().await;
            let candidates = tables
                .conversations
                .values()
                .filter(|row| row.vector.is_comparable_to(query))
                .map(|row| ((row.conversation_id, row.summary.clone()), row.vector.values()));
            rank_by_similarity(query.values(), candidates, None, threshold)?
        };

        let mut results = Vec::new();
        for Scored {
            item: (id, summary),
            score,
        } in ranked
        {
            if results.len() >= limit {
                break;
            }
            let Some(conversation) = self.catalog.conversation(id).await? else {
                continue;
            };
            if conversation.archived || !scope.admits(conversation.user_id, conversation.project_id)
            {
                continue;
            }
            results.push(SimilarConversation {
                id,
                title: conversation.title,
                summary,
                similarity: score,
                created_at: conversation.created_at,
            });
        }

        debug!("Found {} similar conversations", results.len());
        Ok(results)
    }

    async fn find_relevant_file_chunks(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<FileChunkMatch>> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }
        let ranked = self.rank_file_chunks(query, None, threshold).await?;
        self.visible_chunks(ranked, scope, limit).await
    }

    async fn find_relevant_file_chunks_for_files(
        &self,
        query: &EmbeddingVector,
        scope: &SearchScope,
        file_ids: &[FileId],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<FileChunkMatch>> {
        if limit == 0 || query.is_empty() || file_ids.is_empty() {
            return Ok(Vec::new());
        }
        let only: HashSet<FileId> = file_ids.iter().copied().collect();
        let ranked = self.rank_file_chunks(query, Some(&only), threshold).await?;
        self.visible_chunks(ranked, scope, limit).await
    }

    async fn stats(&self) -> StoreStats {
        let tables = self.tables.read().await;
        let mut rows_by_model: BTreeMap<String, usize> = BTreeMap::new();

        let models = tables
            .messages
            .iter()
            .map(|row| row.vector.model())
            .chain(tables.conversations.values().map(|row| row.vector.model()))
            .chain(
                tables
                    .file_chunks
                    .values()
                    .flat_map(BTreeMap::values)
                    .map(|chunk| chunk.vector.model()),
            );
        for model in models {
            *rows_by_model.entry(model.to_string()).or_default() += 1;
        }

        StoreStats {
            message_rows: tables.messages.len(),
            conversation_rows: tables.conversations.len(),
            file_chunk_rows: tables.file_chunks.values().map(BTreeMap::len).sum(),
            files: tables.file_chunks.len(),
            rows_by_model,
        }
    }

    async fn flush(&self) -> Result<()> {
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::types::{MessageRecord, Role};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const MODEL: &str = "test-3";

    fn v(values: [f32; 3]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec(), MODEL)
    }

    fn scope(user_id: i64) -> SearchScope {
        SearchScope::new(user_id, None).unwrap()
    }

    async fn fixture() -> (Arc<InMemoryCatalog>, InMemoryVectorStore) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        for (id, user_id, project_id, archived) in
            [(1, 42, None, false), (2, 42, Some(5), false), (3, 7, None, false), (4, 42, None, true)]
        {
            catalog
                .insert_conversation(ConversationRecord {
                    id,
                    user_id,
                    project_id,
                    title: format!("conversation {id}"),
                    archived,
                    created_at: at,
                })
                .await;
        }
        for (id, conversation_id) in [(10, 1), (11, 1), (20, 2), (30, 3)] {
            catalog
                .insert_message(MessageRecord {
                    id,
                    conversation_id,
                    role: Role::User,
                    content: format!("message {id}"),
                    created_at: at,
                })
                .await;
        }
        for (id, user_id, status) in [
            (7, 42, FileStatus::Active),
            (8, 42, FileStatus::Deleted),
            (9, 42, FileStatus::Active),
            (99, 7, FileStatus::Active),
        ] {
            catalog
                .insert_file(FileRecord {
                    id,
                    user_id,
                    project_id: None,
                    name: format!("file-{id}.txt"),
                    mime_type: "text/plain".to_string(),
                    status,
                })
                .await;
        }

        let store = InMemoryVectorStore::new(catalog.clone());
        (catalog, store)
    }

    #[tokio::test]
    async fn test_messages_ranked_and_scoped() {
        let (_, store) = fixture().await;
        store.store_message_embedding(10, v([1.0, 0.0, 0.0])).await.unwrap();
        store.store_message_embedding(11, v([0.8, 0.6, 0.0])).await.unwrap();
        store.store_message_embedding(20, v([0.9, 0.1, 0.0])).await.unwrap();
        store.store_message_embedding(30, v([1.0, 0.0, 0.0])).await.unwrap();

        let query = v([1.0, 0.0, 0.0]);
        let results = store
            .find_similar_messages(&query, &scope(42), 10, 0.5)
            .await
            .unwrap();
        let ids: Vec<_> = results.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 20, 11]);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[0].content, "message 10");
        assert_eq!(results[0].conversation_id, 1);

        let project = SearchScope::new(42, Some(5)).unwrap();
        let ids: Vec<_> = store
            .find_similar_messages(&query, &project, 10, 0.5)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![20]);
    }

    #[tokio::test]
    async fn test_reembedded_message_reported_once() {
        let (_, store) = fixture().await;
        store.store_message_embedding(10, v([1.0, 0.0, 0.0])).await.unwrap();
        store.store_message_embedding(10, v([0.9, 0.1, 0.0])).await.unwrap();

        let results = store
            .find_similar_messages(&v([1.0, 0.0, 0.0]), &scope(42), 10, 0.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(store.stats().await.message_rows, 2);
    }

    #[tokio::test]
    async fn test_threshold_monotonicity() {
        let (_, store) = fixture().await;
        for (id, values) in [
            (10, [1.0, 0.0, 0.0]),
            (11, [0.6, 0.8, 0.0]),
            (20, [0.0, 1.0, 0.0]),
        ] {
            store.store_message_embedding(id, v(values)).await.unwrap();
            store
                .store_conversation_embedding(id / 10, "s".to_string(), v(values))
                .await
                .unwrap();
            store
                .store_file_chunk(7, id as usize, "chunk".to_string(), v(values))
                .await
                .unwrap();
        }

        let query = v([0.9, 0.3, 0.1]);
        let mut previous = (usize::MAX, usize::MAX, usize::MAX);
        for step in 0..=20 {
            let threshold = -1.0 + step as f32 * 0.1;
            let current = (
                store.find_similar_messages(&query, &scope(42), 10, threshold).await.unwrap().len(),
                store
                    .find_similar_conversations(&query, &scope(42), 10, threshold)
                    .await
                    .unwrap()
                    .len(),
                store
                    .find_relevant_file_chunks(&query, &scope(42), 10, threshold)
                    .await
                    .unwrap()
                    .len(),
            );
            assert!(current.0 <= previous.0 && current.1 <= previous.1 && current.2 <= previous.2);
            previous = current;
        }
    }

    #[tokio::test]
    async fn test_conversation_upsert_keeps_one_row() {
        let (_, store) = fixture().await;
        store
            .store_conversation_embedding(1, "first".to_string(), v([1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .store_conversation_embedding(1, "second".to_string(), v([0.0, 1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(store.stats().await.conversation_rows, 1);
        let results = store
            .find_similar_conversations(&v([0.0, 1.0, 0.0]), &scope(42), 5, 0.9)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary, "second");
        assert_eq!(results[0].title, "conversation 1");
    }

    #[tokio::test]
    async fn test_archived_and_foreign_conversations_excluded() {
        let (_, store) = fixture().await;
        for id in [1, 3, 4] {
            store
                .store_conversation_embedding(id, format!("summary {id}"), v([1.0, 0.0, 0.0]))
                .await
                .unwrap();
        }
        let ids: Vec<_> = store
            .find_similar_conversations(&v([1.0, 0.0, 0.0]), &scope(42), 5, 0.0)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_file_chunks_require_active_owned_files() {
        let (_, store) = fixture().await;
        for file_id in [7, 8, 99] {
            store
                .store_file_chunk(file_id, 0, format!("chunk of {file_id}"), v([1.0, 0.0, 0.0]))
                .await
                .unwrap();
        }
        let results = store
            .find_relevant_file_chunks(&v([1.0, 0.0, 0.0]), &scope(42), 5, 0.5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_id, 7);
        assert_eq!(results[0].file_name, "file-7.txt");
    }

    #[tokio::test]
    async fn test_for_files_restricts_to_given_files() {
        let (_, store) = fixture().await;
        store.store_file_chunk(7, 0, "a".to_string(), v([0.1, 1.0, 0.0])).await.unwrap();
        store.store_file_chunk(7, 1, "b".to_string(), v([0.2, 1.0, 0.0])).await.unwrap();
        store.store_file_chunk(9, 0, "c".to_string(), v([1.0, 0.0, 0.0])).await.unwrap();

        let results = store
            .find_relevant_file_chunks_for_files(&v([1.0, 0.0, 0.0]), &scope(42), &[7], 5, 0.0)
            .await
            .unwrap();
        let keys: Vec<_> = results.iter().map(FileChunkMatch::key).collect();
        assert_eq!(keys, vec![(7, 1), (7, 0)]);
    }

    #[tokio::test]
    async fn test_clear_file_embeddings() {
        let (_, store) = fixture().await;
        for index in 0..3 {
            store
                .store_file_chunk(7, index, "x".to_string(), v([1.0, 0.0, 0.0]))
                .await
                .unwrap();
        }
        assert_eq!(store.clear_file_embeddings(7).await.unwrap(), 3);
        assert_eq!(store.clear_file_embeddings(7).await.unwrap(), 0);
        assert_eq!(store.stats().await.file_chunk_rows, 0);
    }

    #[tokio::test]
    async fn test_other_models_are_not_compared() {
        let (_, store) = fixture().await;
        store
            .store_message_embedding(10, EmbeddingVector::new(vec![1.0, 0.0], "old-2"))
            .await
            .unwrap();
        store.store_message_embedding(11, v([1.0, 0.0, 0.0])).await.unwrap();

        let results = store
            .find_similar_messages(&v([1.0, 0.0, 0.0]), &scope(42), 10, 0.0)
            .await
            .unwrap();
        assert_eq!(results.iter().map(|m| m.id).collect::<Vec<_>>(), vec![11]);

        let stats = store.stats().await;
        assert_eq!(stats.rows_by_model.get("old-2"), Some(&1));
        assert_eq!(stats.rows_by_model.get(MODEL), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_query_finds_nothing() {
        let (_, store) = fixture().await;
        store.store_message_embedding(10, v([1.0, 0.0, 0.0])).await.unwrap();
        let results = store
            .find_similar_messages(&EmbeddingVector::empty("empty-text"), &scope(42), 10, -1.0)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.json");
        let (catalog, _) = fixture().await;

        let store = InMemoryVectorStore::open(&path, catalog.clone()).await.unwrap();
        store.store_message_embedding(10, v([1.0, 0.0, 0.0])).await.unwrap();
        store
            .store_conversation_embedding(1, "summary".to_string(), v([0.0, 1.0, 0.0]))
            .await
            .unwrap();
        store.store_file_chunk(7, 0, "chunk".to_string(), v([0.0, 0.0, 1.0])).await.unwrap();
        store.flush().await.unwrap();

        let reopened = InMemoryVectorStore::open(&path, catalog).await.unwrap();
        assert_eq!(reopened.stats().await, store.stats().await);
        let hits = reopened
            .find_relevant_file_chunks(&v([0.0, 0.0, 1.0]), &scope(42), 1, 0.9)
            .await
            .unwrap();
        assert_eq!(hits[0].text, "chunk");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let err = InMemoryVectorStore::open(&path, catalog).await.err().unwrap();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_future_snapshot_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"version":99,"tables":{"messages":[],"conversations":{},"file_chunks":{}}}"#,
        )
        .unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let err = InMemoryVectorStore::open(&path, catalog).await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedSnapshot(99)));
    }
}
