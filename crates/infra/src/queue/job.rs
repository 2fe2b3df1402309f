//! Queue job types.

use std::time::Instant;

use async_trait::async_trait;
use minuteflow_domain::Result;
use uuid::Uuid;

/// A unit of work on a named queue.
///
/// Jobs are ephemeral scheduling hints; anything durable must live in the
/// record the payload references.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: serde_json::Value,
    /// Deliveries already made for this job (0 on first execution).
    pub attempts_made: u32,
    pub(crate) ready_at: Instant,
    pub(crate) dedupe_id: Option<String>,
}

impl Job {
    pub(crate) fn new(
        queue: impl Into<String>,
        payload: serde_json::Value,
        ready_at: Instant,
        dedupe_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            queue: queue.into(),
            payload,
            attempts_made: 0,
            ready_at,
            dedupe_id,
        }
    }
}

/// Worker pool options for [`super::JobQueue::register_worker`].
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Concurrent executions pulling from the queue.
    pub concurrency: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Trait for processing jobs from a queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process one job. Errors are counted against the queue-level retry
    /// policy; they never crash the worker pool.
    async fn handle(&self, job: &Job) -> Result<()>;
}
