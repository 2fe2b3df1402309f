//! Named queues and their worker pools.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use minuteflow_core::outbox::ports::{EnqueueOptions, JobScheduler};
use minuteflow_domain::{QueueSettings, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job::{Job, JobHandler, WorkerOptions};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    /// Dedupe ids of pending and in-flight jobs.
    active_dedupe: HashSet<String>,
    in_flight: usize,
}

struct Shared {
    settings: QueueSettings,
    queues: Mutex<HashMap<String, QueueState>>,
}

/// In-process job queue manager.
///
/// Workers are tokio tasks polling their queue; handler failures and panics
/// are contained and counted against the queue-level delivery policy.
pub struct JobQueue {
    shared: Arc<Shared>,
    cancellation: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            shared: Arc::new(Shared { settings, queues: Mutex::new(HashMap::new()) }),
            cancellation: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Schedule a job; a dedupe id colliding with a pending or in-flight
    /// job makes this a no-op.
    pub fn enqueue_job(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<()> {
        let mut queues = self.shared.queues.lock();
        let state = queues.entry(queue.to_string()).or_default();

        if let Some(dedupe_id) = &options.dedupe_id {
            if state.active_dedupe.contains(dedupe_id) {
                debug!(queue, dedupe_id, "duplicate job, enqueue is a no-op");
                return Ok(());
            }
            state.active_dedupe.insert(dedupe_id.clone());
        }

        let ready_at = Instant::now() + options.delay.unwrap_or_default();
        let job = Job::new(queue, payload, ready_at, options.dedupe_id);
        debug!(queue, job_id = %job.id, "job enqueued");
        state.jobs.push_back(job);
        Ok(())
    }

    /// Start `concurrency` workers pulling from `queue`.
    pub fn register_worker(&self, queue: &str, handler: Arc<dyn JobHandler>, options: WorkerOptions) {
        let concurrency = options.concurrency.max(1);
        info!(queue, concurrency, "registering queue workers");

        let mut handles = self.handles.lock();
        for worker in 0..concurrency {
            let shared = Arc::clone(&self.shared);
            let handler = Arc::clone(&handler);
            let cancel = self.cancellation.clone();
            let queue = queue.to_string();

            handles.push(tokio::spawn(async move {
                worker_loop(shared, queue, handler, cancel, worker).await;
            }));
        }
    }

    /// Jobs waiting (not in flight) on a queue.
    pub fn depth(&self, queue: &str) -> usize {
        self.shared.queues.lock().get(queue).map_or(0, |state| state.jobs.len())
    }

    /// Cancel all workers and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("shutting down queue workers");
        self.cancellation.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "queue worker panicked during shutdown"),
                Err(_) => warn!("queue worker did not stop within timeout"),
            }
        }
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        if !self.handles.lock().is_empty() && !self.cancellation.is_cancelled() {
            warn!("JobQueue dropped while workers are running; cancelling");
            self.cancellation.cancel();
        }
    }
}

#[async_trait]
impl JobScheduler for JobQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<()> {
        self.enqueue_job(queue, payload, options)
    }
}

async fn worker_loop(
    shared: Arc<Shared>,
    queue: String,
    handler: Arc<dyn JobHandler>,
    cancel: CancellationToken,
    worker: usize,
) {
    debug!(queue, worker, "queue worker started");
    let poll_interval = Duration::from_millis(shared.settings.poll_interval_ms.max(1));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {
                while let Some(job) = claim(&shared, &queue) {
                    let outcome = AssertUnwindSafe(handler.handle(&job)).catch_unwind().await;
                    let result = match outcome {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(_) => Err("job handler panicked".to_string()),
                    };
                    finish(&shared, job, result);

                    if cancel.is_cancelled() {
                        break;
                    }
                }
            }
        }
    }

    debug!(queue, worker, "queue worker stopped");
}

/// Pop the oldest ready job, marking it in flight.
fn claim(shared: &Arc<Shared>, queue: &str) -> Option<Job> {
    let mut queues = shared.queues.lock();
    let state = queues.get_mut(queue)?;

    let now = Instant::now();
    let position = state.jobs.iter().position(|job| job.ready_at <= now)?;
    let job = state.jobs.remove(position)?;
    state.in_flight += 1;
    Some(job)
}

/// Commit a job outcome: free the dedupe id on success or final failure,
/// redeliver otherwise.
fn finish(shared: &Arc<Shared>, mut job: Job, result: std::result::Result<(), String>) {
    let mut queues = shared.queues.lock();
    let Some(state) = queues.get_mut(&job.queue) else {
        return;
    };
    state.in_flight = state.in_flight.saturating_sub(1);

    match result {
        Ok(()) => {
            if let Some(dedupe_id) = &job.dedupe_id {
                state.active_dedupe.remove(dedupe_id);
            }
        }
        Err(error) => {
            job.attempts_made += 1;
            if job.attempts_made < shared.settings.max_attempts {
                debug!(
                    queue = %job.queue,
                    job_id = %job.id,
                    attempts_made = job.attempts_made,
                    error = %error,
                    "job failed, redelivering"
                );
                job.ready_at =
                    Instant::now() + Duration::from_millis(shared.settings.retry_delay_ms);
                state.jobs.push_back(job);
            } else {
                warn!(
                    queue = %job.queue,
                    job_id = %job.id,
                    attempts_made = job.attempts_made,
                    error = %error,
                    "job dropped after exhausting queue deliveries"
                );
                if let Some(dedupe_id) = &job.dedupe_id {
                    state.active_dedupe.remove(dedupe_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use minuteflow_domain::MinuteflowError;
    use serde_json::json;

    use super::*;

    fn fast_settings() -> QueueSettings {
        QueueSettings { poll_interval_ms: 5, max_attempts: 1, retry_delay_ms: 10 }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within timeout");
    }

    struct CountingHandler {
        calls: AtomicU32,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self { calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: &Job) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dedupe_collapses_pending_jobs() {
        let queue = JobQueue::new(fast_settings());

        let options = || EnqueueOptions { delay: None, dedupe_id: Some("job-1".to_string()) };
        queue.enqueue_job("work", json!({}), options()).unwrap();
        queue.enqueue_job("work", json!({}), options()).unwrap();

        assert_eq!(queue.depth("work"), 1);
    }

    #[tokio::test]
    async fn distinct_dedupe_ids_all_enqueue() {
        let queue = JobQueue::new(fast_settings());

        for i in 0..3 {
            queue
                .enqueue_job(
                    "work",
                    json!({}),
                    EnqueueOptions { delay: None, dedupe_id: Some(format!("job-{i}")) },
                )
                .unwrap();
        }

        assert_eq!(queue.depth("work"), 3);
    }

    #[tokio::test]
    async fn workers_process_jobs() {
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(CountingHandler::new());
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 2,
        });

        for _ in 0..5 {
            queue.enqueue_job("work", json!({}), EnqueueOptions::default()).unwrap();
        }

        wait_until(|| handler.calls.load(Ordering::SeqCst) == 5).await;
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn dedupe_id_is_freed_after_completion() {
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(CountingHandler::new());
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        let options = || EnqueueOptions { delay: None, dedupe_id: Some("job-1".to_string()) };
        queue.enqueue_job("work", json!({}), options()).unwrap();
        wait_until(|| handler.calls.load(Ordering::SeqCst) == 1).await;

        // The same dedupe id schedules again once the first job finished
        queue.enqueue_job("work", json!({}), options()).unwrap();
        wait_until(|| handler.calls.load(Ordering::SeqCst) == 2).await;
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn delayed_jobs_wait_for_their_delay() {
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(CountingHandler::new());
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        queue
            .enqueue_job(
                "work",
                json!({}),
                EnqueueOptions { delay: Some(Duration::from_millis(150)), dedupe_id: None },
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0, "not ready yet");

        wait_until(|| handler.calls.load(Ordering::SeqCst) == 1).await;
        queue.shutdown().await;
    }

    struct FlakyHandler {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, _job: &Job) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(MinuteflowError::Network("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn failed_jobs_are_redelivered_up_to_max_attempts() {
        let settings = QueueSettings { poll_interval_ms: 5, max_attempts: 3, retry_delay_ms: 10 };
        let queue = JobQueue::new(settings);
        let handler = Arc::new(FlakyHandler { calls: AtomicU32::new(0), fail_first: 2 });
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        queue.enqueue_job("work", json!({}), EnqueueOptions::default()).unwrap();

        wait_until(|| handler.calls.load(Ordering::SeqCst) == 3).await;
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn exhausted_jobs_are_dropped_and_free_their_dedupe_id() {
        // max_attempts 1: a single failure drops the job
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(FlakyHandler { calls: AtomicU32::new(0), fail_first: 1 });
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        let options = || EnqueueOptions { delay: None, dedupe_id: Some("job-1".to_string()) };
        queue.enqueue_job("work", json!({}), options()).unwrap();
        wait_until(|| handler.calls.load(Ordering::SeqCst) == 1).await;

        // Dropped, not redelivered
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        // Dedupe id is free again, and this time the handler succeeds
        queue.enqueue_job("work", json!({}), options()).unwrap();
        wait_until(|| handler.calls.load(Ordering::SeqCst) == 2).await;
        queue.shutdown().await;
    }

    struct PanickingHandler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn handle(&self, _job: &Job) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                panic!("handler exploded");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn handler_panic_does_not_crash_the_pool() {
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(PanickingHandler { calls: AtomicU32::new(0) });
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        queue.enqueue_job("work", json!({}), EnqueueOptions::default()).unwrap();
        queue.enqueue_job("work", json!({}), EnqueueOptions::default()).unwrap();

        wait_until(|| handler.calls.load(Ordering::SeqCst) == 2).await;
        queue.shutdown().await;
    }

    struct RecordingHandler {
        seen: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: &Job) -> Result<()> {
            self.seen.lock().push(job.payload.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn single_worker_preserves_fifo_order() {
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(RecordingHandler { seen: Mutex::new(Vec::new()) });
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        for i in 0..4 {
            queue.enqueue_job("work", json!({ "seq": i }), EnqueueOptions::default()).unwrap();
        }

        wait_until(|| handler.seen.lock().len() == 4).await;
        let seen = handler.seen.lock();
        let order: Vec<i64> = seen.iter().map(|v| v["seq"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_processing() {
        let queue = JobQueue::new(fast_settings());
        let handler = Arc::new(CountingHandler::new());
        queue.register_worker("work", Arc::clone(&handler) as Arc<dyn JobHandler>, WorkerOptions {
            concurrency: 1,
        });

        queue.shutdown().await;

        queue.enqueue_job("work", json!({}), EnqueueOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
