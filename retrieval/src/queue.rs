//! Vectorization queue.
//!
//! Ingestion enqueues "embed this" jobs and returns immediately; a drain
//! pass embeds them later. Messages and conversations live in separate
//! queues. Priority orders jobs only within a queue.
//!
//! A drain takes a snapshot of each queue when it starts, so jobs enqueued
//! while it runs wait for the next pass. At most one drain runs per queue;
//! a concurrent drain skips a queue that is already being drained.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use semctx_embeddings::{EmbeddingGenerator, EmbeddingSource};
use semctx_vector_store::{
    ConversationCatalog, ConversationId, MessageId, MessageRecord, VectorStore,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Characters of transcript kept as a conversation summary.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Job priority within a queue. Declared highest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    fn slot(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// What a job embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Message,
    Conversation,
}

/// A pending request to embed a message or a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizationJob {
    pub target_id: i64,
    pub kind: JobKind,
    pub priority: Priority,
    pub conversation_id: ConversationId,
}

impl VectorizationJob {
    pub fn message(
        message_id: MessageId,
        conversation_id: ConversationId,
        priority: Priority,
    ) -> Self {
        Self {
            target_id: message_id,
            kind: JobKind::Message,
            priority,
            conversation_id,
        }
    }

    pub fn conversation(conversation_id: ConversationId, priority: Priority) -> Self {
        Self {
            target_id: conversation_id,
            kind: JobKind::Conversation,
            priority,
            conversation_id,
        }
    }
}

/// Snapshot of queue sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub message_queue_len: usize,
    pub conversation_queue_len: usize,
    pub is_draining: bool,
}

/// What a drain pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Jobs whose embedding was stored.
    pub embedded: usize,
    /// Jobs logged and discarded.
    pub dropped: usize,
    /// Queues skipped because another drain owned them.
    pub skipped_queues: usize,
}

impl DrainReport {
    pub fn processed(&self) -> usize {
        self.embedded + self.dropped
    }

    fn absorb(&mut self, other: DrainReport) {
        self.embedded += other.embedded;
        self.dropped += other.dropped;
        self.skipped_queues += other.skipped_queues;
    }
}

enum JobOutcome {
    Embedded,
    Dropped(String),
}

/// Jobs of one kind, bucketed by priority.
#[derive(Default)]
struct JobQueue {
    buckets: Mutex<[VecDeque<VectorizationJob>; 3]>,
    draining: AtomicBool,
}

impl JobQueue {
    async fn push(&self, job: VectorizationJob) {
        let mut buckets = self.buckets.lock().await;

        let existing = buckets.iter().enumerate().find_map(|(slot, bucket)| {
            bucket
                .iter()
                .position(|pending| pending.target_id == job.target_id)
                .map(|index| (slot, index))
        });

        if let Some((slot, index)) = existing {
            if slot <= job.priority.slot() {
                debug!(
                    "{:?} {} already queued at {:?}",
                    job.kind, job.target_id, Priority::ALL[slot]
                );
                return;
            }
            buckets[slot].remove(index);
        }

        buckets[job.priority.slot()].push_back(job);
    }

    async fn len(&self) -> usize {
        self.buckets.lock().await.iter().map(VecDeque::len).sum()
    }

    async fn take_all(&self) -> Vec<VectorizationJob> {
        let mut buckets = self.buckets.lock().await;
        buckets.iter_mut().flat_map(std::mem::take).collect()
    }

    async fn pending(&self) -> Vec<VectorizationJob> {
        let buckets = self.buckets.lock().await;
        buckets.iter().flatten().cloned().collect()
    }

    fn try_begin_drain(&self) -> Option<DrainGuard<'_>> {
        if self.draining.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(DrainGuard(&self.draining))
        }
    }

    fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }
}

/// Releases a queue's drain flag, also when the drain is cancelled.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Buffers vectorization jobs and embeds them on drain.
pub struct VectorizationQueue {
    messages: JobQueue,
    conversations: JobQueue,
    catalog: Arc<dyn ConversationCatalog>,
    generator: Arc<EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    wake: Notify,
}

impl VectorizationQueue {
    pub fn new(
        catalog: Arc<dyn ConversationCatalog>,
        generator: Arc<EmbeddingGenerator>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            messages: JobQueue::default(),
            conversations: JobQueue::default(),
            catalog,
            generator,
            store,
            wake: Notify::new(),
        }
    }

    /// Queue a job. A target already pending keeps one entry at the higher
    /// of the two priorities.
    pub async fn enqueue(&self, job: VectorizationJob) {
        debug!(
            "Queueing {:?} {} ({:?})",
            job.kind, job.target_id, job.priority
        );
        self.queue(job.kind).push(job).await;
        self.wake.notify_one();
    }

    pub async fn status(&self) -> QueueStatus {
        QueueStatus {
            message_queue_len: self.messages.len().await,
            conversation_queue_len: self.conversations.len().await,
            is_draining: self.messages.is_draining() || self.conversations.is_draining(),
        }
    }

    /// Pending jobs of one kind in drain order.
    pub async fn pending(&self, kind: JobKind) -> Vec<VectorizationJob> {
        self.queue(kind).pending().await
    }

    /// Discard every pending job. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let removed =
            self.messages.take_all().await.len() + self.conversations.take_all().await.len();
        if removed > 0 {
            info!("Cleared {removed} pending vectorization jobs");
        }
        removed
    }

    /// Embed everything queued when the pass starts.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        report.absorb(self.drain_queue(JobKind::Message).await);
        report.absorb(self.drain_queue(JobKind::Conversation).await);

        if report.embedded > 0 {
            if let Err(e) = self.store.flush().await {
                warn!("Failed to flush vector store after drain: {e}");
            }
        }
        if report.processed() > 0 {
            info!(
                "Vectorization drain finished: {} embedded, {} dropped",
                report.embedded, report.dropped
            );
        }
        report
    }

    /// Run [`Self::drain`] on every enqueue and at `interval` until `cancel`
    /// fires.
    pub fn spawn_drainer(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        let interval = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Vectorization drainer started (interval {interval:?})");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = queue.wake.notified() => {}
                    _ = ticker.tick() => {}
                }
                queue.drain().await;
            }

            info!("Vectorization drainer stopped");
        })
    }

    fn queue(&self, kind: JobKind) -> &JobQueue {
        match kind {
            JobKind::Message => &self.messages,
            JobKind::Conversation => &self.conversations,
        }
    }

    async fn drain_queue(&self, kind: JobKind) -> DrainReport {
        let queue = self.queue(kind);
        let Some(_guard) = queue.try_begin_drain() else {
            debug!("{kind:?} queue is already draining, skipping");
            return DrainReport {
                skipped_queues: 1,
                ..DrainReport::default()
            };
        };

        let jobs = queue.take_all().await;
        let mut report = DrainReport::default();
        for job in jobs {
            match self.process(&job).await {
                JobOutcome::Embedded => report.embedded += 1,
                JobOutcome::Dropped(reason) => {
                    warn!(
                        "Dropping vectorization job for {:?} {}: {reason}",
                        job.kind, job.target_id
                    );
                    report.dropped += 1;
                }
            }
        }
        report
    }

    async fn process(&self, job: &VectorizationJob) -> JobOutcome {
        match job.kind {
            JobKind::Message => self.embed_message(job.target_id).await,
            JobKind::Conversation => self.embed_conversation(job.target_id).await,
        }
    }

    async fn embed_message(&self, message_id: MessageId) -> JobOutcome {
        let message = match self.catalog.message(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => return JobOutcome::Dropped("message not found".to_string()),
            Err(e) => return JobOutcome::Dropped(format!("catalog error: {e}")),
        };

        let generated = self.generator.generate_detailed(&message.content).await;
        if let Some(reason) = unusable(&generated.source) {
            return JobOutcome::Dropped(reason);
        }

        match self
            .store
            .store_message_embedding(message_id, generated.vector)
            .await
        {
            Ok(()) => JobOutcome::Embedded,
            Err(e) => JobOutcome::Dropped(format!("store error: {e}")),
        }
    }

    async fn embed_conversation(&self, conversation_id: ConversationId) -> JobOutcome {
        let messages = match self.catalog.conversation_messages(conversation_id).await {
            Ok(messages) if messages.is_empty() => {
                return JobOutcome::Dropped("conversation has no messages".to_string());
            }
            Ok(messages) => messages,
            Err(e) => return JobOutcome::Dropped(format!("catalog error: {e}")),
        };

        let transcript = transcript(&messages);
        let generated = self.generator.generate_detailed(&transcript).await;
        if let Some(reason) = unusable(&generated.source) {
            return JobOutcome::Dropped(reason);
        }

        match self
            .store
            .store_conversation_embedding(conversation_id, summarize(&transcript), generated.vector)
            .await
        {
            Ok(()) => JobOutcome::Embedded,
            Err(e) => JobOutcome::Dropped(format!("store error: {e}")),
        }
    }
}

fn unusable(source: &EmbeddingSource) -> Option<String> {
    match source {
        EmbeddingSource::Disabled => Some("vectorization disabled".to_string()),
        EmbeddingSource::EmptyText => Some("empty text".to_string()),
        EmbeddingSource::Primary
        | EmbeddingSource::Cached
        | EmbeddingSource::Fallback { .. } => None,
    }
}

/// One `role: content` line per message.
pub fn transcript(messages: &[MessageRecord]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Leading [`SUMMARY_MAX_CHARS`] characters of a transcript, whitespace
/// collapsed.
pub fn summarize(transcript: &str) -> String {
    semctx_embeddings::collapse_whitespace(transcript)
        .chars()
        .take(SUMMARY_MAX_CHARS)
        .collect()
}
