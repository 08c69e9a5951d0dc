//! Worker Pool: drains the Task Queue, runs the per-task state
//! machine (POP → FETCH → INFER → CALLBACK → terminate), and releases the
//! record. N executors run as parallel async tasks, each handling one task
//! at a time end-to-end — no interleaving within a single executor. The
//! pool is always a set of OS-thread-backed async tasks rather than one
//! process per task, since the inference runtime can't be forked safely.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};

use crate::callback::CallbackDispatcher;
use crate::dispatch::PipelineRegistry;
use crate::domain::{CallbackEnvelope, ErrorKind, ImageRef, RequestParameters, TaskRecord};
use crate::fetcher::{FetchError, ImageFetcher};
use crate::observability::Metrics;
use crate::queue::TaskQueue;
use crate::store::TaskStore;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub pop_timeout: Duration,
    pub reap_interval: Duration,
    /// Destination directory for images fetched from a remote `imageUrl`;
    /// kept distinct from the Ingress's multipart upload directory so a
    /// fetch failure never collides with an uploaded file of the same
    /// taskId.
    pub fetch_dir: PathBuf,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            pop_timeout: Duration::from_secs(5),
            reap_interval: Duration::from_secs(60),
            fetch_dir: PathBuf::from("data/uploads/fetched"),
        }
    }
}

pub struct WorkerPool {
    store: Arc<TaskStore>,
    queue: Arc<TaskQueue>,
    fetcher: Arc<ImageFetcher>,
    callback: Arc<CallbackDispatcher>,
    pipelines: Arc<PipelineRegistry>,
    metrics: Arc<Metrics>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        store: Arc<TaskStore>,
        queue: Arc<TaskQueue>,
        fetcher: Arc<ImageFetcher>,
        callback: Arc<CallbackDispatcher>,
        pipelines: Arc<PipelineRegistry>,
        metrics: Arc<Metrics>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            store,
            queue,
            fetcher,
            callback,
            pipelines,
            metrics,
            config,
        }
    }

    /// Spawns `config.concurrency` executor loops and a reaper loop,
    /// returning their join handles. Callers decide whether to await them
    /// or let them run for the process lifetime.
    pub fn spawn(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.concurrency + 1);
        for id in 0..self.config.concurrency {
            let pool = self.clone();
            handles.push(tokio::spawn(async move { pool.executor_loop(id).await }));
        }
        let reaper = self.clone();
        handles.push(tokio::spawn(async move { reaper.reaper_loop().await }));
        handles
    }

    async fn executor_loop(&self, id: usize) {
        info!(executor = id, "worker executor started");
        loop {
            match self.queue.pop(self.config.pop_timeout).await {
                Ok(Some(lease)) => {
                    match self.process(&lease.task_id).await {
                        Ok(()) => {
                            if let Err(err) = self.queue.ack(lease.seq) {
                                error!(executor = id, seq = lease.seq, error = %err, "failed to ack queue item");
                            }
                        }
                        Err(err) => {
                            error!(executor = id, task_id = %lease.task_id, error = %err, "task processing error, nacking for redelivery");
                            if let Err(err) = self.queue.nack(lease.seq) {
                                error!(executor = id, seq = lease.seq, error = %err, "failed to nack queue item");
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    error!(executor = id, error = %err, "queue pop failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn reaper_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.reap_interval);
        loop {
            ticker.tick().await;
            match self.store.reap_expired() {
                Ok(reaped) if reaped > 0 => {
                    self.metrics.records_reaped(reaped as u64);
                    info!(reaped, "recovery sweep reaped expired task records");
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "recovery sweep failed"),
            }
            match self.queue.depth() {
                Ok(depth) => info!(depth, "recovery sweep queue depth"),
                Err(err) => error!(error = %err, "recovery sweep failed to read queue depth"),
            }
        }
    }

    /// Runs the FETCH → INFER → CALLBACK → terminate chain for one taskId.
    /// `Ok(())` covers every outcome the state machine defines as handled,
    /// including a missing record (already-terminated, the idempotence
    /// signal) and an undelivered callback (record retained for TTL). `Err`
    /// means the Store itself failed (`StoreUnavailable`, spec §7) — the
    /// caller nacks the queue item so it's redelivered instead of lost.
    async fn process(&self, task_id: &str) -> crate::store::Result<()> {
        let Some(record) = self.store.get(task_id)? else {
            info!(task_id, "record absent on pop, already terminated");
            return Ok(());
        };

        let outcome = self.run_pipeline(&record).await;

        let envelope = match outcome {
            Ok(data) => CallbackEnvelope::success(
                record.task_id.clone(),
                record.metadata.clone(),
                request_parameters(&record),
                data,
            ),
            Err(kind) => CallbackEnvelope::failure(
                record.task_id.clone(),
                record.metadata.clone(),
                request_parameters(&record),
                kind.to_error_detail(kind.display_message()),
            ),
        };

        let delivered = self.callback.send(&record.callback_url, &envelope).await;
        if delivered {
            self.metrics.callback_delivered();
            self.store.delete(&record.task_id)?;
            info!(task_id = %record.task_id, "task completed and record released");
        } else {
            self.metrics.callback_undelivered();
            warn!(task_id = %record.task_id, "callback undelivered, record retained until TTL");
        }
        Ok(())
    }

    async fn run_pipeline(&self, record: &TaskRecord) -> Result<serde_json::Value, ErrorKind> {
        let image_path = self.resolve_image(record).await?;
        self.pipelines
            .dispatch(record.task_type, &image_path, record.patient_info.as_ref())
    }

    async fn resolve_image(&self, record: &TaskRecord) -> Result<PathBuf, ErrorKind> {
        match &record.image_ref {
            ImageRef::LocalPath(path) => {
                let path = PathBuf::from(path);
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(ErrorKind::ImageUnreachable);
                }
                Ok(path)
            }
            ImageRef::RemoteUrl(url) => self
                .fetcher
                .fetch(url, &self.config.fetch_dir, &record.task_id)
                .await
                .map_err(map_fetch_error),
        }
    }
}

fn request_parameters(record: &TaskRecord) -> RequestParameters {
    RequestParameters {
        task_type: record.task_type.as_str().to_string(),
        image_url: record.image_ref.display_url(),
    }
}

fn map_fetch_error(err: FetchError) -> ErrorKind {
    match err {
        FetchError::TooLarge { .. } => ErrorKind::ImageTooLarge,
        FetchError::BadFormat(_) => ErrorKind::ImageFormatBad,
        FetchError::Unreachable(_) | FetchError::Io(_) => ErrorKind::ImageUnreachable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;
    use time::OffsetDateTime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn build_pool(dir: &TempDir, callback_timeout: StdDuration) -> WorkerPool {
        let store = Arc::new(TaskStore::open(dir.path().join("store")).unwrap());
        let queue = Arc::new(TaskQueue::open(dir.path().join("queue"), StdDuration::from_secs(30)).unwrap());
        let fetcher = Arc::new(
            ImageFetcher::new(crate::fetcher::FetcherConfig {
                timeout: StdDuration::from_secs(5),
                max_size: crate::humanize::ByteSize(10 * 1024 * 1024),
            })
            .unwrap(),
        );
        let callback = Arc::new(CallbackDispatcher::new(callback_timeout).unwrap());
        let pipelines = Arc::new(PipelineRegistry::default());
        let metrics = Arc::new(Metrics::new());
        WorkerPool::new(
            store,
            queue,
            fetcher,
            callback,
            pipelines,
            metrics,
            WorkerPoolConfig {
                concurrency: 1,
                pop_timeout: StdDuration::from_millis(200),
                reap_interval: StdDuration::from_secs(60),
                fetch_dir: dir.path().join("fetched"),
            },
        )
    }

    #[tokio::test]
    async fn missing_record_is_treated_as_already_terminated() {
        let dir = TempDir::new().unwrap();
        let pool = build_pool(&dir, StdDuration::from_secs(5));
        pool.process("nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn successful_pipeline_and_callback_deletes_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let pool = build_pool(&dir, StdDuration::from_secs(5));

        let record = TaskRecord {
            task_id: "t1".into(),
            task_type: TaskType::Panoramic,
            image_ref: ImageRef::LocalPath(dir.path().join("img.jpg").display().to_string()),
            callback_url: format!("{}/cb", server.uri()),
            metadata: json!({}),
            patient_info: None,
            created_at: OffsetDateTime::now_utc(),
            ttl_sec: 3600,
        };
        tokio::fs::write(dir.path().join("img.jpg"), b"fake").await.unwrap();
        pool.store.create(&record).await.unwrap();

        pool.process("t1").await.unwrap();
        assert!(!pool.store.exists("t1").unwrap());
    }

    #[tokio::test]
    async fn missing_local_image_retains_record_after_failure_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let pool = build_pool(&dir, StdDuration::from_secs(5));

        let record = TaskRecord {
            task_id: "t2".into(),
            task_type: TaskType::Panoramic,
            image_ref: ImageRef::LocalPath(dir.path().join("missing.jpg").display().to_string()),
            callback_url: format!("{}/cb", server.uri()),
            metadata: json!({}),
            patient_info: None,
            created_at: OffsetDateTime::now_utc(),
            ttl_sec: 3600,
        };
        pool.store.create(&record).await.unwrap();

        pool.process("t2").await.unwrap();
        // Delivered FAILURE callback still releases the record.
        assert!(!pool.store.exists("t2").unwrap());
    }

    #[tokio::test]
    async fn undelivered_callback_retains_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let pool = build_pool(&dir, StdDuration::from_secs(5));

        let record = TaskRecord {
            task_id: "t3".into(),
            task_type: TaskType::Panoramic,
            image_ref: ImageRef::LocalPath(dir.path().join("img.jpg").display().to_string()),
            callback_url: format!("{}/cb", server.uri()),
            metadata: json!({}),
            patient_info: None,
            created_at: OffsetDateTime::now_utc(),
            ttl_sec: 3600,
        };
        tokio::fs::write(dir.path().join("img.jpg"), b"fake").await.unwrap();
        pool.store.create(&record).await.unwrap();

        pool.process("t3").await.unwrap();
        assert!(pool.store.exists("t3").unwrap());
    }

    #[tokio::test]
    async fn process_surfaces_store_error_instead_of_silently_succeeding() {
        let dir = TempDir::new().unwrap();
        let pool = build_pool(&dir, StdDuration::from_secs(5));

        pool.store.poison("t4").unwrap();

        assert!(pool.process("t4").await.is_err());
    }

    #[tokio::test]
    async fn store_failure_nacks_queue_item_instead_of_acking() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TaskStore::open(dir.path().join("store")).unwrap());
        let queue = Arc::new(
            TaskQueue::open(dir.path().join("queue"), StdDuration::from_millis(50)).unwrap(),
        );
        let fetcher = Arc::new(
            ImageFetcher::new(crate::fetcher::FetcherConfig {
                timeout: StdDuration::from_secs(5),
                max_size: crate::humanize::ByteSize(10 * 1024 * 1024),
            })
            .unwrap(),
        );
        let callback = Arc::new(CallbackDispatcher::new(StdDuration::from_secs(5)).unwrap());
        let pipelines = Arc::new(PipelineRegistry::default());
        let metrics = Arc::new(Metrics::new());
        let pool = Arc::new(WorkerPool::new(
            store.clone(),
            queue.clone(),
            fetcher,
            callback,
            pipelines,
            metrics,
            WorkerPoolConfig {
                concurrency: 1,
                pop_timeout: StdDuration::from_millis(50),
                reap_interval: StdDuration::from_secs(60),
                fetch_dir: dir.path().join("fetched"),
            },
        ));

        store.poison("t5").unwrap();
        queue.push("t5").await.unwrap();

        let handles = pool.clone().spawn();
        // Give the executor time to pop, fail on the poisoned record, and
        // nack; then wait past the visibility timeout for redelivery.
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        for handle in handles {
            handle.abort();
        }

        // A nacked item is immediately re-visible, so it must still be
        // poppable — an ack would have removed it permanently.
        let redelivered = queue
            .pop(StdDuration::from_millis(200))
            .await
            .unwrap();
        assert!(redelivered.is_some(), "poisoned task must be nacked, not dropped");
    }
}
