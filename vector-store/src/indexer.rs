//! File indexing: chunk, embed, store.

use std::sync::Arc;

use semctx_embeddings::{EmbeddingGenerator, collapse_whitespace};
use tracing::{debug, info, warn};

use crate::chunker::FileChunker;
use crate::error::Result;
use crate::store::VectorStore;
use crate::types::FileId;

/// Turns extracted file text into stored [`crate::types::FileChunk`]s.
///
/// Indexing is best effort per chunk: a chunk that cannot be embedded or
/// stored is skipped and the rest of the file is still indexed.
pub struct FileIndexer {
    store: Arc<dyn VectorStore>,
    generator: Arc<EmbeddingGenerator>,
    chunker: FileChunker,
}

impl FileIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        generator: Arc<EmbeddingGenerator>,
        chunker: FileChunker,
    ) -> Self {
        Self {
            store,
            generator,
            chunker,
        }
    }

    pub fn chunker(&self) -> &FileChunker {
        &self.chunker
    }

    /// Index `text` as the content of `file_id`, replacing earlier chunks.
    ///
    /// Returns the number of chunks stored. When vectorization is disabled
    /// nothing is touched and zero is returned.
    pub async fn index_file_content(&self, file_id: FileId, text: &str) -> Result<usize> {
        if !self.generator.flag().is_enabled() {
            debug!("Vectorization disabled, not indexing file {file_id}");
            return Ok(0);
        }

        let chunks = self.chunker.split(&collapse_whitespace(text));

        let cleared = self.store.clear_file_embeddings(file_id).await?;
        if cleared > 0 {
            debug!("Removed {cleared} previous chunks of file {file_id}");
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = self.generator.generate_batch(&texts).await;
        let total = texts.len();
        drop(texts);

        let mut stored = 0;
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            if vector.is_empty() {
                warn!(
                    "Skipping chunk {} of file {file_id}: no embedding",
                    chunk.index
                );
                continue;
            }
            match self
                .store
                .store_file_chunk(file_id, chunk.index, chunk.text, vector)
                .await
            {
                Ok(()) => stored += 1,
                Err(e) => warn!("Skipping chunk {} of file {file_id}: {e}", chunk.index),
            }
        }

        if let Err(e) = self.store.flush().await {
            warn!("Failed to flush vector store after indexing file {file_id}: {e}");
        }

        info!("Indexed file {file_id}: {stored} of {total} chunks stored");
        Ok(stored)
    }

    /// Remove every chunk of `file_id`.
    pub async fn clear_file_embeddings(&self, file_id: FileId) -> Result<usize> {
        let removed = self.store.clear_file_embeddings(file_id).await?;
        if let Err(e) = self.store.flush().await {
            warn!("Failed to flush vector store after clearing file {file_id}: {e}");
        }
        Ok(removed)
    }
}
