//! Worker pool for embedding computation.
//!
//! Embedding calls are handed to a fixed set of worker tasks so the request
//! path only ever awaits a reply channel. Each worker owns a bounded job
//! queue and runs one embedding at a time. The pool is created on first use.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{OnceCell, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers. `None` uses the available CPU parallelism.
    pub workers: Option<usize>,

    /// Upper bound on a single dispatch, queueing included.
    pub job_timeout: Duration,

    /// Pending jobs each worker buffers before `dispatch` waits.
    pub channel_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            job_timeout: Duration::from_secs(30),
            channel_capacity: 64,
        }
    }
}

/// What a worker produced.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Embedded {
        vector: Vec<f32>,
        model: String,
        dimensions: usize,
    },
    Failed {
        error: String,
    },
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    pub outcome: WorkerOutcome,
    pub elapsed_ms: u64,
}

impl WorkerResult {
    fn embedded(response: EmbeddingResponse, started: Instant) -> Self {
        Self {
            outcome: WorkerOutcome::Embedded {
                dimensions: response.dimension,
                vector: response.embedding,
                model: response.model,
            },
            elapsed_ms: elapsed_ms(started),
        }
    }

    fn failed(error: impl Into<String>, started: Instant) -> Self {
        Self {
            outcome: WorkerOutcome::Failed {
                error: error.into(),
            },
            elapsed_ms: elapsed_ms(started),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, WorkerOutcome::Embedded { .. })
    }

    /// Error message, if the dispatch failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            WorkerOutcome::Failed { error } => Some(error),
            WorkerOutcome::Embedded { .. } => None,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Workers running, zero before first use.
    pub workers: usize,
    /// How many times the worker set was constructed. Never exceeds one.
    pub initializations: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub in_flight: usize,
}

type Reply = std::result::Result<EmbeddingResponse, String>;

struct Job {
    request: EmbeddingRequest,
    reply: oneshot::Sender<Reply>,
}

struct Worker {
    sender: mpsc::Sender<Job>,
    in_flight: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

/// Bounded pool of embedding workers.
pub struct WorkerPool {
    provider: Arc<dyn EmbeddingProvider>,
    config: PoolConfig,
    workers: OnceCell<Vec<Worker>>,
    next: AtomicUsize,
    shut_down: AtomicBool,
    initializations: AtomicU64,
    dispatched: AtomicU64,
    failed: AtomicU64,
}

impl WorkerPool {
    /// Create a pool around `provider`. No workers start until the first dispatch.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: PoolConfig) -> Self {
        Self {
            provider,
            config,
            workers: OnceCell::new(),
            next: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
            initializations: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Name of the provider behind the pool.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Model the provider embeds with.
    pub fn provider_model(&self) -> &str {
        self.provider.default_model()
    }

    /// Whether dispatches can be expected to reach a working provider.
    pub fn is_ready(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire) && self.provider.is_available()
    }

    fn worker_count(&self) -> usize {
        self.config
            .workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1)
    }

    async fn workers(&self) -> &[Worker] {
        self.workers
            .get_or_init(|| async { self.spawn_workers() })
            .await
    }

    fn spawn_workers(&self) -> Vec<Worker> {
        self.initializations.fetch_add(1, Ordering::AcqRel);
        let count = self.worker_count();
        let capacity = self.config.channel_capacity.max(1);

        let workers = (0..count)
            .map(|id| {
                let (sender, receiver) = mpsc::channel(capacity);
                let in_flight = Arc::new(AtomicUsize::new(0));
                let handle = tokio::spawn(run_worker(
                    id,
                    Arc::clone(&self.provider),
                    receiver,
                    Arc::clone(&in_flight),
                ));
                Worker {
                    sender,
                    in_flight,
                    handle,
                }
            })
            .collect();

        info!(
            "Started {count} embedding workers (provider: {})",
            self.provider.name()
        );
        workers
    }

    /// Least busy worker, ties broken round-robin.
    fn pick<'a>(&self, workers: &'a [Worker]) -> Option<&'a Worker> {
        let len = workers.len();
        if len == 0 {
            return None;
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;
        (0..len)
            .map(|offset| &workers[(start + offset) % len])
            .min_by_key(|worker| worker.in_flight.load(Ordering::Acquire))
    }

    /// Embed one text on a worker.
    ///
    /// Never retries. Any failure, including a worker panic or timeout, is
    /// reported as [`WorkerOutcome::Failed`].
    pub async fn dispatch(&self, text: &str) -> WorkerResult {
        let started = Instant::now();

        if self.shut_down.load(Ordering::Acquire) {
            return self.record_failure(WorkerResult::failed("worker pool is shut down", started));
        }

        let workers = self.workers().await;
        let Some(worker) = self.pick(workers) else {
            return self.record_failure(WorkerResult::failed("worker pool is empty", started));
        };

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            request: EmbeddingRequest::new(text),
            reply: reply_tx,
        };

        let exchange = async {
            // Count the job only once it is handed over; the worker owns the
            // decrement from then on, even if this future is dropped.
            let permit = worker
                .sender
                .reserve()
                .await
                .map_err(|_| "worker is not accepting jobs".to_string())?;
            worker.in_flight.fetch_add(1, Ordering::AcqRel);
            permit.send(job);
            reply_rx
                .await
                .map_err(|_| "worker dropped the job".to_string())?
        };

        let result = match tokio::time::timeout(self.config.job_timeout, exchange).await {
            Ok(Ok(response)) => validate(response, started),
            Ok(Err(error)) => WorkerResult::failed(error, started),
            Err(_) => WorkerResult::failed(
                format!("embedding timed out after {:?}", self.config.job_timeout),
                started,
            ),
        };

        if result.is_success() {
            debug!("Worker embedding finished in {}ms", result.elapsed_ms);
            result
        } else {
            self.record_failure(result)
        }
    }

    /// Embed many texts concurrently. Output order matches input order.
    pub async fn dispatch_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<WorkerResult> {
        join_all(texts.iter().map(|text| self.dispatch(text.as_ref()))).await
    }

    fn record_failure(&self, result: WorkerResult) -> WorkerResult {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = result.error() {
            warn!("Embedding dispatch failed: {error}");
        }
        result
    }

    /// Stop accepting work and abort running workers.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(workers) = self.workers.get() {
            for worker in workers {
                worker.handle.abort();
            }
        }
        info!("Embedding worker pool shut down");
    }

    pub fn stats(&self) -> PoolStats {
        let (workers, in_flight) = self.workers.get().map_or((0, 0), |workers| {
            (
                workers.len(),
                workers
                    .iter()
                    .map(|w| w.in_flight.load(Ordering::Acquire))
                    .sum(),
            )
        });
        PoolStats {
            workers,
            initializations: self.initializations.load(Ordering::Acquire),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight,
        }
    }
}

fn validate(response: EmbeddingResponse, started: Instant) -> WorkerResult {
    if response.embedding.is_empty() {
        return WorkerResult::failed("provider returned an empty embedding", started);
    }
    if response.dimension != response.embedding.len() {
        return WorkerResult::failed(
            format!(
                "provider reported {} dimensions but returned {}",
                response.dimension,
                response.embedding.len()
            ),
            started,
        );
    }
    WorkerResult::embedded(response, started)
}

async fn run_worker(
    id: usize,
    provider: Arc<dyn EmbeddingProvider>,
    mut receiver: mpsc::Receiver<Job>,
    in_flight: Arc<AtomicUsize>,
) {
    while let Some(job) = receiver.recv().await {
        let reply = match AssertUnwindSafe(provider.embed(job.request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(err.to_string()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Embedding worker {id} panicked: {message}");
                Err(format!("worker {id} panicked: {message}"))
            }
        };
        in_flight.fetch_sub(1, Ordering::AcqRel);
        // The caller may have given up already.
        let _ = job.reply.send(reply);
    }
    debug!("Embedding worker {id} stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, Result};
    use crate::hash::HashEmbedder;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Echoes the text length, sleeping less for longer texts so batch
    /// results complete out of order.
    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn name(&self) -> &str {
            "length"
        }
        fn default_model(&self) -> &str {
            "length-1"
        }
        fn default_dimension(&self) -> usize {
            1
        }
        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            let len = request.text.len();
            tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(len as u64 * 5))).await;
            if request.text == "panic" {
                panic!("model exploded");
            }
            if request.text == "error" {
                return Err(EmbeddingError::ApiRequest("bad input".to_string()));
            }
            if request.text == "slow" {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Ok(EmbeddingResponse {
                embedding: vec![len as f32],
                model: "length-1".to_string(),
                dimension: 1,
                tokens_used: None,
            })
        }
        fn is_available(&self) -> bool {
            true
        }
    }

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(
            Arc::new(LengthProvider),
            PoolConfig {
                workers: Some(workers),
                job_timeout: Duration::from_millis(200),
                channel_capacity: 8,
            },
        )
    }

    #[tokio::test]
    async fn test_pool_is_lazy() {
        let pool = pool(2);
        assert_eq!(pool.stats().workers, 0);
        assert!(pool.dispatch("abc").await.is_success());
        assert_eq!(pool.stats().workers, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_builds_one_pool() {
        let pool = Arc::new(pool(3));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.dispatch(&format!("text {i}")).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_success());
        }
        let stats = pool.stats();
        assert_eq!(stats.initializations, 1);
        assert_eq!(stats.workers, 3);
        assert_eq!(stats.dispatched, 16);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let pool = pool(4);
        let texts = ["a", "abcdefgh", "abc", "abcdef", ""];
        let results = pool.dispatch_batch(&texts).await;
        let lengths: Vec<f32> = results
            .iter()
            .map(|r| match &r.outcome {
                WorkerOutcome::Embedded { vector, .. } => vector[0],
                WorkerOutcome::Failed { error } => panic!("unexpected failure: {error}"),
            })
            .collect();
        assert_eq!(lengths, vec![1.0, 8.0, 3.0, 6.0, 0.0]);
    }

    #[tokio::test]
    async fn test_worker_panic_is_a_failure_and_worker_survives() {
        let pool = pool(1);
        let result = pool.dispatch("panic").await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("model exploded"));

        assert!(pool.dispatch("fine").await.is_success());
        assert_eq!(pool.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_a_failure() {
        let result = pool(1).dispatch("error").await;
        assert!(result.error().unwrap().contains("bad input"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let result = pool(1).dispatch("slow").await;
        assert!(result.error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timed_out_dispatches_release_in_flight() {
        let pool = WorkerPool::new(
            Arc::new(LengthProvider),
            PoolConfig {
                workers: Some(1),
                job_timeout: Duration::from_millis(50),
                channel_capacity: 1,
            },
        );

        let results = pool.dispatch_batch(&["slow"; 6]).await;
        assert!(results.iter().all(|r| !r.is_success()));
        assert_eq!(pool.stats().failed, 6);

        // Jobs that reached the worker still finish; the rest never counted.
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.stats().in_flight > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(pool.stats().in_flight, 0);

        // The worker is still picked and serves new work.
        assert!(pool.dispatch("ten chars!").await.is_success());
        assert_eq!(pool.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_reports_model_and_dimensions() {
        let pool = WorkerPool::new(Arc::new(HashEmbedder::new(16)), PoolConfig::default());
        let result = pool.dispatch("hello world").await;
        match result.outcome {
            WorkerOutcome::Embedded {
                vector,
                model,
                dimensions,
            } => {
                assert_eq!(dimensions, 16);
                assert_eq!(vector.len(), 16);
                assert_eq!(model, "local-hash-16");
            }
            WorkerOutcome::Failed { error } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_rejects_work() {
        let pool = pool(1);
        assert!(pool.dispatch("abc").await.is_success());
        pool.shutdown();
        assert!(!pool.is_ready());
        let result = pool.dispatch("abc").await;
        assert!(result.error().unwrap().contains("shut down"));
    }
}
